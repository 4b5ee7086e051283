//! Local gateway that mints intents itself.
//!
//! Signatures use the same scheme as Razorpay, so a callback produced with
//! [`SandboxGateway::sign`] (or `fk-cli payment sign`) settles an order
//! exactly like a real one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use forkful_core::ports::PaymentGateway;
use forkful_core::{
    CommerceError, CurrencyCode, Money, OrderId, PaymentCallback, PaymentIntent, PaymentIntentId,
    PaymentMethod,
};

use super::GatewayError;

/// In-process payment gateway.
#[derive(Clone)]
pub struct SandboxGateway {
    inner: Arc<SandboxGatewayInner>,
}

struct SandboxGatewayInner {
    key_id: String,
    secret: SecretString,
    intents: Mutex<HashMap<OrderId, PaymentIntent>>,
    offline: AtomicBool,
}

impl SandboxGateway {
    #[must_use]
    pub fn new(key_id: impl Into<String>, secret: SecretString) -> Self {
        Self {
            inner: Arc::new(SandboxGatewayInner {
                key_id: key_id.into(),
                secret,
                intents: Mutex::new(HashMap::new()),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Sign a completion callback the way the gateway would.
    #[must_use]
    pub fn sign(&self, intent_id: &str, transaction_id: &str) -> String {
        super::sign_callback(intent_id, transaction_id, self.inner.secret.expose_secret())
    }

    /// Simulate an outage: intent creation fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of distinct intents created so far.
    pub async fn intent_count(&self) -> usize {
        self.inner.intents.lock().await.len()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_intent(
        &self,
        amount: Money,
        currency: CurrencyCode,
        idempotency_key: OrderId,
    ) -> Result<PaymentIntent, CommerceError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(format!("{amount} is not chargeable")).into());
        }
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(CommerceError::unavailable("payment gateway unavailable"));
        }

        let mut intents = self.inner.intents.lock().await;
        if let Some(existing) = intents.get(&idempotency_key) {
            if existing.amount != amount || existing.currency != currency {
                return Err(CommerceError::failed_precondition(
                    "order was already submitted to the gateway with a different amount",
                ));
            }
            return Ok(existing.clone());
        }

        let id = PaymentIntentId::parse(format!("order_sbx_{}", idempotency_key.as_uuid().simple()))?;
        let intent = PaymentIntent {
            id,
            amount,
            currency,
        };
        intents.insert(idempotency_key, intent.clone());
        tracing::debug!(intent = %intent.id, order_id = %idempotency_key, "Sandbox intent created");
        Ok(intent)
    }

    fn authenticate_callback(&self, callback: &PaymentCallback) -> bool {
        super::authenticate_callback(
            callback.intent_id.as_str(),
            callback.transaction_id.as_str(),
            callback.signature.as_str(),
            self.inner.secret.expose_secret(),
        )
    }

    fn public_key(&self) -> &str {
        &self.inner.key_id
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Sandbox
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::{ErrorKind, Signature, TransactionId};

    use super::*;

    fn gateway() -> SandboxGateway {
        SandboxGateway::new("sandbox", SecretString::from("kR7#pL2@vN9!qW4$"))
    }

    #[tokio::test]
    async fn test_same_key_returns_same_intent() {
        let gateway = gateway();
        let key = OrderId::new();
        let first = gateway
            .create_intent(Money::from_minor(230), CurrencyCode::INR, key)
            .await
            .unwrap();
        let again = gateway
            .create_intent(Money::from_minor(230), CurrencyCode::INR, key)
            .await
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(gateway.intent_count().await, 1);

        let other = gateway
            .create_intent(Money::from_minor(230), CurrencyCode::INR, OrderId::new())
            .await
            .unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let err = gateway()
            .create_intent(Money::from_minor(-5), CurrencyCode::INR, OrderId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_offline_is_unavailable() {
        let gateway = gateway();
        gateway.set_offline(true);
        let err = gateway
            .create_intent(Money::from_minor(100), CurrencyCode::INR, OrderId::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[test]
    fn test_signed_callback_authenticates() {
        let gateway = gateway();
        let callback = PaymentCallback {
            intent_id: PaymentIntentId::parse("order_sbx_1").unwrap(),
            transaction_id: TransactionId::parse("pay_1").unwrap(),
            signature: Signature::parse(gateway.sign("order_sbx_1", "pay_1")).unwrap(),
        };
        assert!(gateway.authenticate_callback(&callback));

        let forged = PaymentCallback {
            signature: Signature::parse("00ff").unwrap(),
            ..callback
        };
        assert!(!gateway.authenticate_callback(&forged));
    }
}
