//! CLI command implementations.

pub mod migrate;
pub mod payment;
pub mod seed;
pub mod token;
