//! Razorpay Orders API adapter.
//!
//! A Razorpay "order" is what the rest of the system calls a payment intent.
//! Uses `reqwest` 0.13 for HTTP and caches created intents per idempotency
//! key using `moka` (24-hour TTL).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use forkful_core::ports::PaymentGateway;
use forkful_core::{
    CommerceError, CurrencyCode, Money, OrderId, PaymentCallback, PaymentIntent, PaymentIntentId,
    PaymentMethod,
};

use super::GatewayError;
use crate::config::PaymentConfig;

/// Request body for `POST /v1/orders`.
#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
    notes: CreateOrderNotes,
}

#[derive(Debug, Serialize)]
struct CreateOrderNotes {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    #[serde(default)]
    description: String,
}

/// Client for the Razorpay Orders API.
#[derive(Clone)]
pub struct RazorpayGateway {
    inner: Arc<RazorpayGatewayInner>,
}

struct RazorpayGatewayInner {
    client: reqwest::Client,
    endpoint: String,
    key_id: String,
    key_secret: SecretString,
    timeout: Duration,
    intents: Cache<OrderId, PaymentIntent>,
}

impl RazorpayGateway {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let intents = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(24 * 60 * 60))
            .build();

        let endpoint = format!("{}/v1/orders", config.api_base.as_str().trim_end_matches('/'));

        Ok(Self {
            inner: Arc::new(RazorpayGatewayInner {
                client,
                endpoint,
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                timeout: config.timeout,
                intents,
            }),
        })
    }

    /// Create a Razorpay order for `amount`.
    async fn create_order(
        &self,
        amount: Money,
        currency: CurrencyCode,
        order_id: OrderId,
    ) -> Result<PaymentIntent, GatewayError> {
        let body = CreateOrderRequest {
            amount: amount.minor(),
            currency: currency.code(),
            receipt: order_id.to_string(),
            notes: CreateOrderNotes {
                order_id: order_id.to_string(),
            },
        };

        let send = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.inner.timeout, send)
            .await
            .map_err(|_| GatewayError::Timeout(self.inner.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.inner.timeout)
                } else {
                    GatewayError::Http(e)
                }
            })?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<RazorpayErrorBody>(&response_text)
                .map(|b| b.error.description)
                .unwrap_or_else(|_| response_text.chars().take(200).collect());
            tracing::error!(
                status = %status,
                message = %message,
                "Razorpay API returned non-success status"
            );
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let order: RazorpayOrder = serde_json::from_str(&response_text)?;
        debug!(razorpay_order = %order.id, "Razorpay order created");

        if order.amount != amount.minor() || !order.currency.eq_ignore_ascii_case(currency.code()) {
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message: format!(
                    "gateway echoed {} {} for a {} {} request",
                    order.amount, order.currency, amount, currency
                ),
            });
        }

        let id = PaymentIntentId::parse(&order.id).map_err(|_| GatewayError::Upstream {
            status: status.as_u16(),
            message: "gateway returned a blank order id".to_string(),
        })?;

        Ok(PaymentIntent {
            id,
            amount,
            currency,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip_all, fields(amount = %amount, currency = %currency, order_id = %idempotency_key))]
    async fn create_intent(
        &self,
        amount: Money,
        currency: CurrencyCode,
        idempotency_key: OrderId,
    ) -> Result<PaymentIntent, CommerceError> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(format!("{amount} is not chargeable")).into());
        }

        // Concurrent calls for one key share a single upstream request.
        let intent = self
            .inner
            .intents
            .try_get_with(idempotency_key, async {
                self.create_order(amount, currency, idempotency_key)
                    .await
                    .map_err(CommerceError::from)
            })
            .await
            .map_err(|e| (*e).clone())?;

        if intent.amount != amount || intent.currency != currency {
            return Err(CommerceError::failed_precondition(
                "order was already submitted to the gateway with a different amount",
            ));
        }
        Ok(intent)
    }

    fn authenticate_callback(&self, callback: &PaymentCallback) -> bool {
        super::authenticate_callback(
            callback.intent_id.as_str(),
            callback.transaction_id.as_str(),
            callback.signature.as_str(),
            self.inner.key_secret.expose_secret(),
        )
    }

    fn public_key(&self) -> &str {
        &self.inner.key_id
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Razorpay
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::config::GatewayKind;

    fn config() -> PaymentConfig {
        PaymentConfig {
            gateway: GatewayKind::Razorpay,
            key_id: "rzp_test_abc".to_string(),
            key_secret: SecretString::from("kR7#pL2@vN9!qW4$"),
            // Nothing listens on the discard port
            api_base: Url::parse("http://127.0.0.1:9/").unwrap(),
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let gateway = RazorpayGateway::new(&config()).unwrap();
        assert_eq!(gateway.inner.endpoint, "http://127.0.0.1:9/v1/orders");
        assert_eq!(gateway.public_key(), "rzp_test_abc");
    }

    #[test]
    fn test_request_body_shape() {
        let order_id = OrderId::new();
        let body = CreateOrderRequest {
            amount: 23000,
            currency: "INR",
            receipt: order_id.to_string(),
            notes: CreateOrderNotes {
                order_id: order_id.to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 23000);
        assert_eq!(json["currency"], "INR");
        assert_eq!(json["receipt"], order_id.to_string());
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected_before_network() {
        let gateway = RazorpayGateway::new(&config()).unwrap();
        let err = gateway
            .create_intent(Money::ZERO, CurrencyCode::INR, OrderId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), forkful_core::ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        let gateway = RazorpayGateway::new(&config()).unwrap();
        let err = gateway
            .create_intent(Money::from_minor(100), CurrencyCode::INR, OrderId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), forkful_core::ErrorKind::Unavailable);
    }

    #[test]
    fn test_callback_uses_key_secret() {
        let gateway = RazorpayGateway::new(&config()).unwrap();
        let signature = crate::payment::sign_callback("order_1", "pay_1", "kR7#pL2@vN9!qW4$");
        let callback = PaymentCallback {
            intent_id: PaymentIntentId::parse("order_1").unwrap(),
            transaction_id: forkful_core::TransactionId::parse("pay_1").unwrap(),
            signature: forkful_core::Signature::parse(signature).unwrap(),
        };
        assert!(gateway.authenticate_callback(&callback));
    }
}
