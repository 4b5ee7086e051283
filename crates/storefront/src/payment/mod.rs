//! Payment gateway adapters.
//!
//! # Adapters
//!
//! - [`RazorpayGateway`] - Creates Razorpay orders over HTTPS (basic auth with
//!   the key id and secret). Responses are cached per idempotency key so a
//!   retried Place for the same order returns the same remote intent.
//! - [`SandboxGateway`] - Mints intents locally. Used for development and tests.
//!
//! Both authenticate completion callbacks the same way: HMAC-SHA256 over
//! `intent_id|transaction_id` keyed with the gateway secret, hex encoded,
//! compared in constant time.

mod razorpay;
mod sandbox;

pub use razorpay::RazorpayGateway;
pub use sandbox::SandboxGateway;

use forkful_core::CommerceError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when talking to a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway did not answer within the configured timeout.
    #[error("gateway timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The gateway answered with something we could not decode.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The amount cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<GatewayError> for CommerceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidAmount(msg) => Self::invalid_argument(msg),
            GatewayError::Upstream {
                status,
                ref message,
            } if (400..500).contains(&status) && status != 429 => {
                tracing::warn!(status, message = %message, "Payment gateway rejected request");
                Self::invalid_argument("payment gateway rejected the request")
            }
            other => {
                tracing::error!(error = %other, "Payment gateway unavailable");
                Self::unavailable("payment gateway unavailable")
            }
        }
    }
}

/// Compute the hex signature a gateway attaches to a completion callback.
#[must_use]
pub fn sign_callback(intent_id: &str, transaction_id: &str, secret: &str) -> String {
    // new_from_slice accepts keys of any length for HMAC
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(intent_id.as_bytes());
    mac.update(b"|");
    mac.update(transaction_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a callback signature against `secret`.
///
/// Returns `false` for anything that does not verify, including signatures
/// that are not valid hex.
#[must_use]
pub fn authenticate_callback(
    intent_id: &str,
    transaction_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(intent_id.as_bytes());
    mac.update(b"|");
    mac.update(transaction_id.as_bytes());
    // Constant-time comparison
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use forkful_core::ErrorKind;

    use super::*;

    const SECRET: &str = "kR7#pL2@vN9!qW4$";

    #[test]
    fn test_signed_callback_authenticates() {
        let signature = sign_callback("order_abc", "pay_123", SECRET);
        assert_eq!(signature.len(), 64);
        assert!(authenticate_callback("order_abc", "pay_123", &signature, SECRET));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let signature = sign_callback("order_abc", "pay_123", "secret");
        assert!(authenticate_callback(
            "order_abc",
            "pay_123",
            &signature.to_uppercase(),
            "secret"
        ));
    }

    #[test]
    fn test_tampered_fields_fail() {
        let signature = sign_callback("order_abc", "pay_123", SECRET);
        assert!(!authenticate_callback("order_abd", "pay_123", &signature, SECRET));
        assert!(!authenticate_callback("order_abc", "pay_124", &signature, SECRET));
        assert!(!authenticate_callback("order_abc", "pay_123", &signature, "other-key"));
    }

    #[test]
    fn test_separator_is_part_of_message() {
        let signature = sign_callback("order_a", "bc", SECRET);
        assert!(!authenticate_callback("order_ab", "c", &signature, SECRET));
    }

    #[test]
    fn test_garbage_signature_is_false_not_error() {
        assert!(!authenticate_callback("order_abc", "pay_123", "not hex!", SECRET));
        assert!(!authenticate_callback("order_abc", "pay_123", "", SECRET));
        assert!(!authenticate_callback("order_abc", "pay_123", "abcd", SECRET));
    }

    #[test]
    fn test_gateway_error_mapping() {
        let err: CommerceError = GatewayError::Timeout(std::time::Duration::from_secs(10)).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err: CommerceError = GatewayError::InvalidAmount("zero".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err: CommerceError = GatewayError::Upstream {
            status: 400,
            message: "amount too small".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err: CommerceError = GatewayError::Upstream {
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
