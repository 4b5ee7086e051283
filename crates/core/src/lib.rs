//! Forkful Core - Domain types and component contracts.
//!
//! This crate provides the types shared by every Forkful component:
//! - `storefront` - Cart, checkout and order-tracking HTTP service
//! - `cli` - Command-line tools for migrations, seeding and development
//!
//! # Architecture
//!
//! The core crate contains only types, pure rules and traits - no I/O, no
//! database access, no HTTP clients. Storage and gateway adapters implement
//! the traits in [`ports`]; the rules they must uphold (cart reconciliation,
//! order validation, the status machine, settlement) live here so every
//! adapter applies the same logic.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, money, carts, orders and the order status machine
//! - [`error`] - The error taxonomy shared by every component
//! - [`ports`] - Async traits for the identity, cart, catalog, ledger and gateway components

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod ports;
pub mod types;

pub use error::{CommerceError, ErrorKind};
pub use types::*;
