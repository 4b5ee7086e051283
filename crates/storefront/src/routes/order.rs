//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use forkful_core::{
    CartLine, DeliveryAddress, Money, Order, OrderId, OrderStatus, PaymentCallback,
};

use super::{ApiJson, ApiResponse};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth, RequireStaff};
use crate::services::{PlaceOrder, PlacedOrder, VerifiedPayment};
use crate::state::AppState;

/// Body of `POST /api/order/place`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
    /// Client-computed total in minor units; must match the server's
    pub amount: Money,
    pub address: Option<DeliveryAddress>,
}

/// Body of `PUT /api/order/status/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `POST /api/order/place`
#[instrument(skip_all, fields(subject = %subject.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> Result<Json<ApiResponse<PlacedOrder>>> {
    let placed = state
        .checkout()
        .place(
            &subject,
            PlaceOrder {
                items: request.items,
                amount: request.amount,
                address: request.address,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(placed)))
}

/// `POST /api/order/verify`
///
/// Accepts gateway webhooks without a credential.
#[instrument(skip_all, fields(intent = %callback.intent_id))]
pub async fn verify(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    ApiJson(callback): ApiJson<PaymentCallback>,
) -> Result<Json<ApiResponse<VerifiedPayment>>> {
    let verified = state.checkout().verify(caller.as_ref(), callback).await?;
    Ok(Json(
        ApiResponse::success(verified).with_message("Payment verified"),
    ))
}

/// `GET /api/order/my`
pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let orders = state.checkout().orders_for(&subject.id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// `GET /api/order/all`
pub async fn all_orders(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let orders = state.checkout().all_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// `PUT /api/order/status/{id}`
#[instrument(skip_all, fields(staff = %staff.id, order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>> {
    let order_id: OrderId = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid order id: {id}")))?;
    let order = state
        .checkout()
        .update_status(order_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
