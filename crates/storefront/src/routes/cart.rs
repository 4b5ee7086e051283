//! Cart route handlers.
//!
//! Every handler answers with the priced cart after the change.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use forkful_core::MenuItemId;

use super::{ApiJson, ApiResponse};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::CartView;
use crate::state::AppState;

/// Body of `POST /api/cart/add`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub item_id: MenuItemId,
    /// Defaults to 1
    pub quantity: Option<i64>,
}

/// Body of `PUT /api/cart/update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub item_id: MenuItemId,
    pub quantity: i64,
}

/// `GET /api/cart`
#[instrument(skip_all, fields(subject = %subject.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state.cart().view(&subject.id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// `POST /api/cart/add`
#[instrument(skip_all, fields(subject = %subject.id, item = %request.item_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
    ApiJson(request): ApiJson<AddToCartRequest>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state
        .cart()
        .add(&subject.id, request.item_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart).with_message("Added to cart")))
}

/// `PUT /api/cart/update`
#[instrument(skip_all, fields(subject = %subject.id, item = %request.item_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
    ApiJson(request): ApiJson<UpdateCartRequest>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart = state
        .cart()
        .update(&subject.id, request.item_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// `DELETE /api/cart/clear`
#[instrument(skip_all, fields(subject = %subject.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(subject): RequireAuth,
) -> Result<Json<ApiResponse<()>>> {
    state.cart().clear(&subject.id).await?;
    Ok(Json(ApiResponse::message("Cart cleared")))
}
