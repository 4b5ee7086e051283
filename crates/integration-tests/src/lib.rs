//! Test harness for the Forkful storefront API.
//!
//! [`TestApp`] builds the real router over the in-memory stores and the
//! sandbox gateway, so tests exercise the HTTP boundary, the checkout
//! orchestration and the store contracts without external services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p forkful-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use forkful_core::ports::CartStore;
use forkful_core::{CatalogItem, CurrencyCode, MenuItemId, Money, SubjectId, SubjectRole};
use forkful_storefront::config::{CommerceConfig, TokenConfig};
use forkful_storefront::db::{InMemoryCartStore, InMemoryCatalog, InMemoryOrderLedger};
use forkful_storefront::payment::SandboxGateway;
use forkful_storefront::services::JwtVerifier;
use forkful_storefront::state::{AppState, Components};

const TOKEN_SECRET: &str = "Zq8!vR2#mT6^wY1&kP4*nB7@cX3$hJ9%";
const GATEWAY_SECRET: &str = "kR7#pL2@vN9!qW4$";

/// Delivery fee used by every test app, in minor units.
pub const DELIVERY_FEE: i64 = 30;

/// A storefront wired to in-memory components.
pub struct TestApp {
    router: Router,
    verifier: JwtVerifier,
    pub carts: InMemoryCartStore,
    pub catalog: InMemoryCatalog,
    pub ledger: InMemoryOrderLedger,
    pub gateway: SandboxGateway,
    /// Priced at 100
    pub dosa: CatalogItem,
    /// Priced at 40
    pub coffee: CatalogItem,
}

/// Decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of a success envelope.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// The `kind` member of an error envelope.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.body["kind"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let carts = InMemoryCartStore::new();
        Self::with_cart_store(Arc::new(carts.clone()), carts)
    }

    /// Serve carts from `store` while `carts` stays available for assertions.
    #[must_use]
    pub fn with_cart_store(store: Arc<dyn CartStore>, carts: InMemoryCartStore) -> Self {
        let dosa = menu_item("Masala Dosa", "Mains", 100);
        let coffee = menu_item("Filter Coffee", "Drinks", 40);
        let catalog = InMemoryCatalog::with_items([dosa.clone(), coffee.clone()]);
        let ledger = InMemoryOrderLedger::new();
        let gateway = SandboxGateway::new("rzp_test_sandbox", SecretString::from(GATEWAY_SECRET));
        let verifier = JwtVerifier::new(&TokenConfig {
            secret: SecretString::from(TOKEN_SECRET),
            issuer: "forkful".to_string(),
        });

        let state = AppState::new(Components {
            carts: store,
            catalog: Arc::new(catalog.clone()),
            ledger: Arc::new(ledger.clone()),
            gateway: Arc::new(gateway.clone()),
            verifier: Arc::new(verifier.clone()),
            commerce: CommerceConfig {
                currency: CurrencyCode::INR,
                delivery_fee: Money::from_minor(DELIVERY_FEE),
            },
            gateway_timeout: Duration::from_secs(5),
        });

        Self {
            router: forkful_storefront::app(state),
            verifier,
            carts,
            catalog,
            ledger,
            gateway,
            dosa,
            coffee,
        }
    }

    /// Bearer token for a customer.
    #[must_use]
    pub fn customer_token(&self, subject: &str) -> String {
        self.token(subject, SubjectRole::Customer)
    }

    /// Bearer token for a staff member.
    #[must_use]
    pub fn staff_token(&self, subject: &str) -> String {
        self.token(subject, SubjectRole::Staff)
    }

    fn token(&self, subject: &str, role: SubjectRole) -> String {
        self.verifier
            .issue(&subject_id(subject), role, chrono::Duration::hours(1))
            .unwrap()
    }

    /// Gateway signature for a completion callback.
    #[must_use]
    pub fn sign(&self, intent_id: &str, transaction_id: &str) -> String {
        self.gateway.sign(intent_id, transaction_id)
    }

    /// Send one request through the full middleware stack.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Add `quantity` units of `item` to the subject's cart through the API.
    pub async fn add_to_cart(&self, token: &str, item: MenuItemId, quantity: i64) {
        let response = self
            .post(
                "/api/cart/add",
                Some(token),
                serde_json::json!({ "itemId": item, "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A delivery address that passes validation.
#[must_use]
pub fn address() -> Value {
    serde_json::json!({
        "name": "Asha Rao",
        "email": "asha@example.com",
        "street": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postalCode": "560001",
        "country": "India"
    })
}

#[must_use]
pub fn subject_id(raw: &str) -> SubjectId {
    SubjectId::parse(raw).unwrap()
}

fn menu_item(name: &str, category: &str, price: i64) -> CatalogItem {
    CatalogItem {
        id: MenuItemId::new(),
        name: name.to_string(),
        description: String::new(),
        category: category.to_string(),
        unit_price: Money::from_minor(price),
    }
}
