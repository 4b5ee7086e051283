//! In-memory stores for tests and local development.
//!
//! They apply the same `forkful_core` rules as the `PostgreSQL` stores. Carts
//! get one async mutex per subject; the ledger mutates under a single write
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use forkful_core::ports::{CartStore, CatalogLookup, OrderLedger};
use forkful_core::{
    Cart, CatalogItem, CommerceError, MenuItemId, NewOrder, Order, OrderId, OrderStatus,
    PaymentCallback, PaymentIntentId, SettleOutcome, SubjectId,
};

/// Carts held in memory, one lock per subject.
#[derive(Default, Clone)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<SubjectId, Arc<Mutex<Cart>>>>>,
}

impl InMemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The subject's cart slot, created on first mutation.
    async fn slot(&self, subject: &SubjectId) -> Arc<Mutex<Cart>> {
        if let Some(slot) = self.carts.read().await.get(subject) {
            return Arc::clone(slot);
        }
        let mut carts = self.carts.write().await;
        Arc::clone(
            carts
                .entry(subject.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Cart::empty(subject.clone())))),
        )
    }

    /// Apply `change` to a copy of the cart and keep it only on success.
    ///
    /// A slot removed by `clear` while this caller waited for it is stale;
    /// the caller starts over with the subject's current slot.
    async fn mutate(
        &self,
        subject: &SubjectId,
        change: impl FnOnce(&mut Cart) -> Result<(), CommerceError> + Send,
    ) -> Result<Cart, CommerceError> {
        loop {
            let slot = self.slot(subject).await;
            let mut held = slot.lock().await;
            let current = self
                .carts
                .read()
                .await
                .get(subject)
                .is_some_and(|live| Arc::ptr_eq(live, &slot));
            if !current {
                continue;
            }
            let mut next = held.clone();
            change(&mut next)?;
            *held = next.clone();
            return Ok(next);
        }
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, subject: &SubjectId) -> Result<Cart, CommerceError> {
        let slot = self.carts.read().await.get(subject).cloned();
        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(Cart::empty(subject.clone())),
        }
    }

    async fn add(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        delta: u32,
    ) -> Result<Cart, CommerceError> {
        self.mutate(subject, |cart| cart.add(item, delta).map(|_| ()))
            .await
    }

    async fn set_quantity(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        self.mutate(subject, |cart| cart.set_quantity(item, quantity))
            .await
    }

    async fn clear(&self, subject: &SubjectId) -> Result<(), CommerceError> {
        self.carts.write().await.remove(subject);
        Ok(())
    }
}

/// A fixed menu held in memory.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<MenuItemId, CatalogItem>>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of items.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let items = items.into_iter().map(|item| (item.id, item)).collect();
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Take an item off the menu.
    pub async fn remove(&self, id: MenuItemId) -> Option<CatalogItem> {
        self.items.write().await.remove(&id)
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn resolve(&self, item: MenuItemId) -> Result<CatalogItem, CommerceError> {
        self.items
            .read()
            .await
            .get(&item)
            .cloned()
            .ok_or_else(|| CommerceError::not_found(format!("menu item {item} not found")))
    }

    async fn list(&self) -> Result<Vec<CatalogItem>, CommerceError> {
        let mut items: Vec<_> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

/// Orders held in memory behind one lock.
#[derive(Default, Clone)]
pub struct InMemoryOrderLedger {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<T>(
        &self,
        order_id: OrderId,
        change: impl FnOnce(&mut Order) -> Result<T, CommerceError> + Send,
    ) -> Result<(Order, T), CommerceError> {
        let mut orders = self.orders.write().await;
        let stored = orders
            .get_mut(&order_id)
            .ok_or_else(|| CommerceError::not_found("order not found"))?;
        let mut next = stored.clone();
        let value = change(&mut next)?;
        *stored = next.clone();
        Ok((next, value))
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn create(&self, order: NewOrder) -> Result<Order, CommerceError> {
        let order = Order::open(order, Utc::now())?;
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        intent: PaymentIntentId,
    ) -> Result<Order, CommerceError> {
        let mut orders = self.orders.write().await;
        if orders
            .values()
            .any(|o| o.id != order_id && o.payment_intent_id.as_ref() == Some(&intent))
        {
            return Err(CommerceError::failed_precondition(
                "payment intent is attached to another order",
            ));
        }
        let stored = orders
            .get_mut(&order_id)
            .ok_or_else(|| CommerceError::not_found("order not found"))?;
        stored.attach_payment_intent(intent, Utc::now())?;
        Ok(stored.clone())
    }

    async fn mark_settled(
        &self,
        order_id: OrderId,
        callback: &PaymentCallback,
    ) -> Result<(Order, SettleOutcome), CommerceError> {
        self.mutate(order_id, |order| order.settle(callback, Utc::now()))
            .await
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let (order, ()) = self
            .mutate(order_id, |order| order.advance(status, Utc::now()))
            .await?;
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Order, CommerceError> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or_else(|| CommerceError::not_found("order not found"))
    }

    async fn find_by_intent(&self, intent: &PaymentIntentId) -> Result<Order, CommerceError> {
        self.orders
            .read()
            .await
            .values()
            .find(|o| o.payment_intent_id.as_ref() == Some(intent))
            .cloned()
            .ok_or_else(|| CommerceError::not_found("order for payment intent not found"))
    }

    async fn list_by_subject(&self, subject: &SubjectId) -> Result<Vec<Order>, CommerceError> {
        let orders = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| &o.subject == subject)
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn list_all(&self) -> Result<Vec<Order>, CommerceError> {
        let orders = self.orders.read().await.values().cloned().collect();
        Ok(Self::newest_first(orders))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::{
        CurrencyCode, DeliveryAddress, ErrorKind, Money, OrderLine, PaymentMethod, Signature,
        TransactionId,
    };

    use super::*;

    fn subject() -> SubjectId {
        SubjectId::parse("subject-1").unwrap()
    }

    fn new_order() -> NewOrder {
        NewOrder {
            subject: subject(),
            lines: vec![OrderLine {
                item_id: MenuItemId::new(),
                name: "Paneer Tikka".to_string(),
                quantity: 2,
                unit_price: Money::from_minor(100),
            }],
            declared_amount: Money::from_minor(230),
            delivery_fee: Money::from_minor(30),
            currency: CurrencyCode::INR,
            address: Some(DeliveryAddress {
                name: "Asha".to_string(),
                street: "12 MG Road".to_string(),
                city: "Bengaluru".to_string(),
                postal_code: "560001".to_string(),
                country: "India".to_string(),
                ..DeliveryAddress::default()
            }),
            payment_method: PaymentMethod::Sandbox,
        }
    }

    fn callback(txn: &str) -> PaymentCallback {
        PaymentCallback {
            intent_id: PaymentIntentId::parse("intent_1").unwrap(),
            transaction_id: TransactionId::parse(txn).unwrap(),
            signature: Signature::parse("sig").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_get_absent_cart_is_empty_without_side_effect() {
        let store = InMemoryCartStore::new();
        assert!(store.get(&subject()).await.unwrap().is_empty());
        assert!(store.carts.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_increments() {
        let store = InMemoryCartStore::new();
        let item = MenuItemId::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.add(&subject(), item, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&subject()).await.unwrap().quantity(item), 16);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cart_untouched() {
        let store = InMemoryCartStore::new();
        let item = MenuItemId::new();
        store.add(&subject(), item, 2).await.unwrap();

        let err = store
            .set_quantity(&subject(), item, -1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.get(&subject()).await.unwrap().quantity(item), 2);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryCartStore::new();
        store.clear(&subject()).await.unwrap();
        store.add(&subject(), MenuItemId::new(), 1).await.unwrap();
        store.clear(&subject()).await.unwrap();
        store.clear(&subject()).await.unwrap();
        assert!(store.get(&subject()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_drops_the_cart() {
        let store = InMemoryCartStore::new();
        let item = MenuItemId::new();
        store.add(&subject(), item, 2).await.unwrap();
        store.clear(&subject()).await.unwrap();
        assert!(store.carts.read().await.is_empty());

        let cart = store.add(&subject(), item, 1).await.unwrap();
        assert_eq!(cart.quantity(item), 1);
        assert_eq!(store.get(&subject()).await.unwrap().quantity(item), 1);
    }

    #[tokio::test]
    async fn test_adds_after_racing_clears_land_in_live_cart() {
        let store = InMemoryCartStore::new();
        let item = MenuItemId::new();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        store.clear(&subject()).await.map(|()| None)
                    } else {
                        store.add(&subject(), item, 1).await.map(Some)
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        store.clear(&subject()).await.unwrap();
        store.add(&subject(), item, 3).await.unwrap();
        assert_eq!(store.get(&subject()).await.unwrap().quantity(item), 3);
        assert_eq!(store.carts.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_intent_cannot_be_shared_between_orders() {
        let ledger = InMemoryOrderLedger::new();
        let first = ledger.create(new_order()).await.unwrap();
        let second = ledger.create(new_order()).await.unwrap();

        let intent = PaymentIntentId::parse("intent_1").unwrap();
        ledger
            .attach_payment_intent(first.id, intent.clone())
            .await
            .unwrap();
        let err = ledger
            .attach_payment_intent(second.id, intent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_concurrent_settlement_has_one_winner() {
        let ledger = InMemoryOrderLedger::new();
        let order = ledger.create(new_order()).await.unwrap();
        ledger
            .attach_payment_intent(order.id, PaymentIntentId::parse("intent_1").unwrap())
            .await
            .unwrap();

        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.mark_settled(order.id, &callback("pay_a")).await })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.mark_settled(order.id, &callback("pay_b")).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.kind(), ErrorKind::FailedPrecondition);

        let stored = ledger.get(order.id).await.unwrap();
        assert!(stored.payment_captured);
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_lists_are_newest_first() {
        let ledger = InMemoryOrderLedger::new();
        let older = ledger.create(new_order()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = ledger.create(new_order()).await.unwrap();

        let mine = ledger.list_by_subject(&subject()).await.unwrap();
        assert_eq!(
            mine.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        let stranger = SubjectId::parse("someone-else").unwrap();
        assert!(ledger.list_by_subject(&stranger).await.unwrap().is_empty());
    }
}
