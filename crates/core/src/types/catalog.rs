//! Menu items as resolved from the catalog.

use serde::{Deserialize, Serialize};

use crate::{MenuItemId, Money};

/// A purchasable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price of one unit, in minor currency units.
    pub unit_price: Money,
}
