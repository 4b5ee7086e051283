//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `menu_item` - Catalog items (managed outside this service, seeded by `fk-cli`)
//! - `cart` / `cart_line` - One cart per subject, lines keyed by menu item
//! - `customer_order` - Orders with a JSONB line snapshot and delivery address
//!
//! # Concurrency
//!
//! - Cart mutations take a transaction-scoped advisory lock keyed on the
//!   subject, so read-modify-write on one subject's cart is linearized.
//! - Order mutations lock the row with `SELECT ... FOR UPDATE` and apply the
//!   transition rules from `forkful_core` before writing back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p forkful-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod memory;
pub mod orders;

use std::time::Duration;

use forkful_core::CommerceError;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::PgCartStore;
pub use catalog::PgCatalog;
pub use memory::{InMemoryCartStore, InMemoryCatalog, InMemoryOrderLedger};
pub use orders::PgOrderLedger;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Constraint violation (e.g., intent already used by another order).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

impl From<RepositoryError> for CommerceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::not_found(format!("{what} not found")),
            RepositoryError::Conflict(msg) => Self::failed_precondition(msg),
            RepositoryError::Database(e) => {
                tracing::error!(error = %e, "Storage operation failed");
                Self::unavailable("storage unavailable")
            }
            RepositoryError::DataCorruption(msg) => {
                tracing::error!(error = %msg, "Stored record failed to decode");
                Self::unavailable("storage unavailable")
            }
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Unique-violation SQLSTATE.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err
        && db.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(err)
}

#[cfg(test)]
mod tests {
    use forkful_core::ErrorKind;

    use super::*;

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err: CommerceError = RepositoryError::NotFound("order").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "order not found");
    }

    #[test]
    fn test_storage_failures_are_unavailable() {
        let err: CommerceError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err: CommerceError = RepositoryError::DataCorruption("bad json".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_conflict_is_failed_precondition() {
        let err: CommerceError = RepositoryError::Conflict("intent in use".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }
}
