//! Error taxonomy shared by every component.
//!
//! Each variant carries a human-readable message that is safe to show to the
//! caller. Adapters translate their own failures (database, HTTP) into one of
//! these kinds before they cross a component boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of a [`CommerceError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Unavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::FailedPrecondition => "failed_precondition",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Errors produced by cart, catalog, ledger, gateway and identity operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommerceError {
    /// Missing, malformed, expired or forged credential.
    #[error("{0}")]
    Unauthenticated(String),

    /// Signature or authorization failure.
    #[error("{0}")]
    PermissionDenied(String),

    /// Malformed or out-of-range input, or an illegal state transition.
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing cart line, catalog item or order.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with state that is already recorded.
    #[error("{0}")]
    FailedPrecondition(String),

    /// A downstream gateway or storage dependency failed transiently.
    #[error("{0}")]
    Unavailable(String),
}

impl CommerceError {
    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// The caller-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::PermissionDenied(m)
            | Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::FailedPrecondition(m)
            | Self::Unavailable(m) => m,
        }
    }

    /// Whether the caller may safely retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            CommerceError::not_found("order").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CommerceError::failed_precondition("settled").kind(),
            ErrorKind::FailedPrecondition
        );
        assert_eq!(
            CommerceError::permission_denied("bad signature").kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_display_is_message_only() {
        let err = CommerceError::invalid_argument("quantity must be at least 1");
        assert_eq!(err.to_string(), "quantity must be at least 1");
        assert_eq!(err.message(), "quantity must be at least 1");
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(CommerceError::unavailable("gateway timeout").is_retryable());
        assert!(!CommerceError::invalid_argument("bad").is_retryable());
        assert!(!CommerceError::failed_precondition("conflict").is_retryable());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FailedPrecondition).unwrap_or_default();
        assert_eq!(json, "\"failed_precondition\"");
        assert_eq!(ErrorKind::PermissionDenied.to_string(), "permission_denied");
    }
}
