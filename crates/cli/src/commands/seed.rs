//! Seed the menu catalog from YAML.
//!
//! ```yaml
//! currency: INR
//! items:
//!   - id: 0d9f6c1e-4b7a-4a53-9d0b-2f1e6a7c8b90
//!     name: Masala Dosa
//!     description: Rice crepe with spiced potato
//!     category: Mains
//!     price: "120.00"
//! ```
//!
//! Prices are major units and are converted to minor units for the currency.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use forkful_core::{CatalogItem, CurrencyCode, MenuItemId, Money};
use forkful_storefront::config::get_database_url;
use forkful_storefront::db::{self, PgCatalog};

/// Menu file layout.
#[derive(Debug, Deserialize)]
pub struct MenuFile {
    #[serde(default)]
    pub currency: CurrencyCode,
    pub items: Vec<MenuEntry>,
}

/// One menu entry.
#[derive(Debug, Deserialize)]
pub struct MenuEntry {
    pub id: MenuItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
}

/// Check every entry and convert prices to minor units.
///
/// Returns one message per invalid entry.
pub fn validate(menu: &MenuFile) -> Result<Vec<CatalogItem>, Vec<String>> {
    let mut items = Vec::with_capacity(menu.items.len());
    let mut errors = Vec::new();

    for entry in &menu.items {
        if entry.name.trim().is_empty() {
            errors.push(format!("{}: name is empty", entry.id));
            continue;
        }
        match Money::from_major(entry.price, menu.currency) {
            Some(price) if price.is_positive() => items.push(CatalogItem {
                id: entry.id,
                name: entry.name.trim().to_string(),
                description: entry.description.trim().to_string(),
                category: entry.category.trim().to_string(),
                unit_price: price,
            }),
            _ => errors.push(format!(
                "{}: price {} is not a positive {} amount",
                entry.name,
                entry.price,
                menu.currency.code()
            )),
        }
    }

    if errors.is_empty() {
        Ok(items)
    } else {
        Err(errors)
    }
}

/// Insert or update every menu item in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an entry is
/// invalid, or a database write fails.
pub async fn menu(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading menu from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let menu: MenuFile = serde_yaml::from_str(&content)?;

    let items = match validate(&menu) {
        Ok(items) => items,
        Err(errors) => {
            error!("Menu validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let catalog = PgCatalog::new(pool);
    for item in &items {
        catalog.upsert(item).await?;
    }

    info!(items = items.len(), currency = menu.currency.code(), "Menu seeded");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MENU: &str = r#"
currency: INR
items:
  - id: 0d9f6c1e-4b7a-4a53-9d0b-2f1e6a7c8b90
    name: Masala Dosa
    category: Mains
    price: "120.50"
  - id: 7a3e2b11-5c4d-4e8f-a1b2-c3d4e5f60718
    name: Filter Coffee
    description: Chicory blend
    category: Drinks
    price: "40"
"#;

    #[test]
    fn test_prices_become_minor_units() {
        let menu: MenuFile = serde_yaml::from_str(MENU).unwrap();
        let items = validate(&menu).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items.first().unwrap().unit_price, Money::from_minor(12050));
        assert_eq!(items.last().unwrap().unit_price, Money::from_minor(4000));
    }

    #[test]
    fn test_invalid_entries_are_reported() {
        let mut menu: MenuFile = serde_yaml::from_str(MENU).unwrap();
        menu.items.first_mut().unwrap().price = Decimal::ZERO;
        menu.items.last_mut().unwrap().name = "  ".to_string();

        let errors = validate(&menu).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
