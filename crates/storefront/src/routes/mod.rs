//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Readiness (storage reachable)
//!
//! # Menu
//! GET    /api/food/list           - Menu items
//!
//! # Cart (auth)
//! GET    /api/cart                - Priced cart
//! POST   /api/cart/add            - Add units of an item
//! PUT    /api/cart/update         - Set a line's quantity (0 removes)
//! DELETE /api/cart/clear          - Empty the cart
//!
//! # Orders
//! POST   /api/order/place         - Open an order and a payment intent (auth)
//! POST   /api/order/verify        - Settle a signed gateway callback (auth optional)
//! GET    /api/order/my            - Caller's orders (auth)
//! GET    /api/order/all           - Every order (staff)
//! PUT    /api/order/status/{id}   - Advance an order (staff)
//! ```
//!
//! Success bodies are `{ "success": true, "data": ... }`; failures are
//! rendered by [`AppError`].

pub mod cart;
pub mod catalog;
pub mod order;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;
use crate::state::AppState;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// JSON body extractor whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", put(cart::update))
        .route("/clear", delete(cart::clear))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/place", post(order::place))
        .route("/verify", post(order::verify))
        .route("/my", get(order::my_orders))
        .route("/all", get(order::all_orders))
        .route("/status/{id}", put(order::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/food/list", get(catalog::list))
        .nest("/api/cart", cart_routes())
        .nest("/api/order", order_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the order ledger is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.ledger().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
