//! `PostgreSQL` menu catalog (read-only from the storefront's side).

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use forkful_core::ports::CatalogLookup;
use forkful_core::{CatalogItem, CommerceError, MenuItemId, Money};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    id: MenuItemId,
    name: String,
    description: String,
    category: String,
    unit_price: i64,
}

impl From<MenuItemRow> for CatalogItem {
    fn from(row: MenuItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            unit_price: Money::from_minor(row.unit_price),
        }
    }
}

/// Menu items in `storefront.menu_item`.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a menu item, keyed by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn upsert(&self, item: &CatalogItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.menu_item (id, name, description, category, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                unit_price = EXCLUDED.unit_price,
                updated_at = NOW()
            ",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.unit_price.minor())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogLookup for PgCatalog {
    #[instrument(skip_all, fields(item = %item))]
    async fn resolve(&self, item: MenuItemId) -> Result<CatalogItem, CommerceError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, name, description, category, unit_price
            FROM storefront.menu_item
            WHERE id = $1
            ",
        )
        .bind(item)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(CatalogItem::from)
            .ok_or_else(|| CommerceError::not_found(format!("menu item {item} not found")))
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<CatalogItem>, CommerceError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, name, description, category, unit_price
            FROM storefront.menu_item
            ORDER BY name
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(CatalogItem::from).collect())
    }
}
