//! Menu route handlers.

use axum::{Json, extract::State};
use serde::Serialize;

use forkful_core::{CatalogItem, MenuItemId, Money};

use super::ApiResponse;
use crate::error::Result;
use crate::state::AppState;

/// Menu item as listed to customers.
#[derive(Debug, Serialize)]
pub struct MenuItemView {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Minor currency units
    pub price: Money,
}

impl From<CatalogItem> for MenuItemView {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            category: item.category,
            price: item.unit_price,
        }
    }
}

/// `GET /api/food/list`
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<MenuItemView>>>> {
    let items = state.catalog().list().await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(MenuItemView::from).collect(),
    )))
}
