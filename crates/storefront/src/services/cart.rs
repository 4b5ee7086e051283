//! Cart operations and the priced cart view.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use forkful_core::ports::{CartStore, CatalogLookup};
use forkful_core::{
    Cart, CommerceError, CurrencyCode, ErrorKind, MenuItemId, Money, SubjectId, parse_delta,
};

use crate::config::CommerceConfig;

/// One cart line joined with the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartViewLine {
    pub item_id: MenuItemId,
    pub quantity: u32,
    /// `false` once the item has been taken off the menu
    pub available: bool,
    pub name: Option<String>,
    pub unit_price: Option<Money>,
    pub line_total: Option<Money>,
}

/// A cart priced against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub currency: CurrencyCode,
}

/// Cart mutations gated by catalog membership.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogLookup>,
    commerce: CommerceConfig,
}

impl CartService {
    #[must_use]
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogLookup>,
        commerce: CommerceConfig,
    ) -> Self {
        Self {
            carts,
            catalog,
            commerce,
        }
    }

    /// The subject's cart, priced.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the cart or catalog cannot be read.
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn view(&self, subject: &SubjectId) -> Result<CartView, CommerceError> {
        let cart = self.carts.get(subject).await?;
        self.price(&cart).await
    }

    /// Add `quantity` (default 1) units of a menu item.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a quantity below 1, `NotFound` if the item is not
    /// on the menu.
    #[instrument(skip_all, fields(subject = %subject, item = %item))]
    pub async fn add(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        quantity: Option<i64>,
    ) -> Result<CartView, CommerceError> {
        let delta = parse_delta(quantity)?;
        self.catalog.resolve(item).await?;
        let cart = self.carts.add(subject, item, delta).await?;
        self.price(&cart).await
    }

    /// Replace the quantity of a line already in the cart; zero removes it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative quantity, `NotFound` if the line is absent.
    #[instrument(skip_all, fields(subject = %subject, item = %item))]
    pub async fn update(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        quantity: i64,
    ) -> Result<CartView, CommerceError> {
        let cart = self.carts.set_quantity(subject, item, quantity).await?;
        self.price(&cart).await
    }

    /// Empty the cart. Clearing an empty cart succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage fails.
    #[instrument(skip_all, fields(subject = %subject))]
    pub async fn clear(&self, subject: &SubjectId) -> Result<(), CommerceError> {
        self.carts.clear(subject).await
    }

    async fn price(&self, cart: &Cart) -> Result<CartView, CommerceError> {
        let overflow = || CommerceError::invalid_argument("cart total is too large");
        let mut lines = Vec::with_capacity(cart.line_count());
        let mut subtotal = Money::ZERO;

        for line in cart.lines() {
            match self.catalog.resolve(line.item_id).await {
                Ok(item) => {
                    let line_total = item.unit_price.checked_mul(line.quantity).ok_or_else(overflow)?;
                    subtotal = subtotal.checked_add(line_total).ok_or_else(overflow)?;
                    lines.push(CartViewLine {
                        item_id: line.item_id,
                        quantity: line.quantity,
                        available: true,
                        name: Some(item.name),
                        unit_price: Some(item.unit_price),
                        line_total: Some(line_total),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => lines.push(CartViewLine {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    available: false,
                    name: None,
                    unit_price: None,
                    line_total: None,
                }),
                Err(e) => return Err(e),
            }
        }

        let delivery_fee = if cart.is_empty() {
            Money::ZERO
        } else {
            self.commerce.delivery_fee
        };

        Ok(CartView {
            lines,
            subtotal,
            delivery_fee,
            total: subtotal.checked_add(delivery_fee).ok_or_else(overflow)?,
            currency: self.commerce.currency,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::CatalogItem;

    use super::*;
    use crate::db::{InMemoryCartStore, InMemoryCatalog};

    fn item(name: &str, price: i64) -> CatalogItem {
        CatalogItem {
            id: MenuItemId::new(),
            name: name.to_string(),
            description: String::new(),
            category: "Mains".to_string(),
            unit_price: Money::from_minor(price),
        }
    }

    fn service(catalog: &InMemoryCatalog) -> CartService {
        CartService::new(
            Arc::new(InMemoryCartStore::new()),
            Arc::new(catalog.clone()),
            CommerceConfig {
                currency: CurrencyCode::INR,
                delivery_fee: Money::from_minor(30),
            },
        )
    }

    fn subject() -> SubjectId {
        SubjectId::parse("subject-1").unwrap()
    }

    #[tokio::test]
    async fn test_empty_cart_has_no_delivery_fee() {
        let service = service(&InMemoryCatalog::new());
        let view = service.view(&subject()).await.unwrap();
        assert!(view.lines.is_empty());
        assert_eq!(view.delivery_fee, Money::ZERO);
        assert_eq!(view.total, Money::ZERO);
    }

    #[tokio::test]
    async fn test_priced_view_adds_fee() {
        let dosa = item("Masala Dosa", 100);
        let catalog = InMemoryCatalog::with_items([dosa.clone()]);
        let service = service(&catalog);

        let view = service.add(&subject(), dosa.id, Some(2)).await.unwrap();
        assert_eq!(view.subtotal, Money::from_minor(200));
        assert_eq!(view.delivery_fee, Money::from_minor(30));
        assert_eq!(view.total, Money::from_minor(230));
        assert_eq!(view.lines.first().unwrap().line_total, Some(Money::from_minor(200)));
    }

    #[tokio::test]
    async fn test_add_unknown_item_is_not_found() {
        let service = service(&InMemoryCatalog::new());
        let err = service
            .add(&subject(), MenuItemId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.view(&subject()).await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_add_zero_is_invalid() {
        let dosa = item("Masala Dosa", 100);
        let service = service(&InMemoryCatalog::with_items([dosa.clone()]));
        let err = service.add(&subject(), dosa.id, Some(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_vanished_item_is_marked_unavailable() {
        let dosa = item("Masala Dosa", 100);
        let idli = item("Idli", 50);
        let catalog = InMemoryCatalog::with_items([dosa.clone(), idli.clone()]);
        let service = service(&catalog);
        service.add(&subject(), dosa.id, None).await.unwrap();
        service.add(&subject(), idli.id, None).await.unwrap();

        catalog.remove(idli.id).await;

        let view = service.view(&subject()).await.unwrap();
        let gone = view.lines.iter().find(|l| l.item_id == idli.id).unwrap();
        assert!(!gone.available);
        assert_eq!(view.subtotal, Money::from_minor(100));
    }
}
