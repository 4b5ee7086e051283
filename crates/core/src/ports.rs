//! Component contracts.
//!
//! The storefront composes these behind `Arc<dyn Trait>` so the same
//! orchestration runs over PostgreSQL in production and in-memory stores in
//! tests. Implementations report failures as [`CommerceError`]; storage and
//! transport failures surface as `Unavailable`.

use async_trait::async_trait;

use crate::{
    Cart, CatalogItem, CommerceError, CurrencyCode, MenuItemId, Money, NewOrder, Order, OrderId,
    OrderStatus, PaymentCallback, PaymentIntent, PaymentIntentId, PaymentMethod, SettleOutcome,
    SubjectId, SubjectRole,
};

/// The actor behind a verified bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub id: SubjectId,
    pub role: SubjectRole,
}

impl AuthenticatedSubject {
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_privileged()
    }
}

/// Validates bearer credentials.
pub trait IdentityVerifier: Send + Sync {
    /// Check a raw credential and return the subject it names.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` if the credential is malformed, forged or expired.
    fn verify(&self, credential: &str) -> Result<AuthenticatedSubject, CommerceError>;
}

/// Per-subject carts. Mutations for one subject are linearized.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The subject's cart, empty if none exists.
    async fn get(&self, subject: &SubjectId) -> Result<Cart, CommerceError>;

    /// Add `delta` units of `item`, creating the cart or line as needed.
    ///
    /// Catalog membership is checked by the caller.
    async fn add(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        delta: u32,
    ) -> Result<Cart, CommerceError>;

    /// Replace the quantity of an existing line; zero removes it.
    async fn set_quantity(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        quantity: i64,
    ) -> Result<Cart, CommerceError>;

    /// Delete the subject's cart. Clearing an absent cart succeeds.
    async fn clear(&self, subject: &SubjectId) -> Result<(), CommerceError>;
}

/// Read-only view of the menu.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve one item, failing `NotFound` if it is not on the menu.
    async fn resolve(&self, item: MenuItemId) -> Result<CatalogItem, CommerceError>;

    /// Every item on the menu, by name.
    async fn list(&self) -> Result<Vec<CatalogItem>, CommerceError>;
}

/// Durable order records. Every mutation goes through [`Order`]'s own rules
/// while the record is locked, so concurrent callers observe one winner.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Validate and persist a new `Processing` order.
    async fn create(&self, order: NewOrder) -> Result<Order, CommerceError>;

    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        intent: PaymentIntentId,
    ) -> Result<Order, CommerceError>;

    /// Capture payment for an authenticated callback.
    async fn mark_settled(
        &self,
        order_id: OrderId,
        callback: &PaymentCallback,
    ) -> Result<(Order, SettleOutcome), CommerceError>;

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError>;

    async fn get(&self, order_id: OrderId) -> Result<Order, CommerceError>;

    /// The order a payment intent was attached to.
    async fn find_by_intent(&self, intent: &PaymentIntentId) -> Result<Order, CommerceError>;

    /// The subject's orders, newest first.
    async fn list_by_subject(&self, subject: &SubjectId) -> Result<Vec<Order>, CommerceError>;

    /// Every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>, CommerceError>;

    /// Check that the backing storage is reachable.
    async fn ping(&self) -> Result<(), CommerceError> {
        Ok(())
    }
}

/// A remote payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create (or return the existing) intent for `idempotency_key`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a non-positive amount, `Unavailable` on
    /// transport failure or timeout.
    async fn create_intent(
        &self,
        amount: Money,
        currency: CurrencyCode,
        idempotency_key: OrderId,
    ) -> Result<PaymentIntent, CommerceError>;

    /// Whether the callback's signature was produced with the gateway secret.
    ///
    /// Never fails: anything that does not verify is `false`.
    fn authenticate_callback(&self, callback: &PaymentCallback) -> bool;

    /// Publishable key the client needs to open the gateway checkout.
    fn public_key(&self) -> &str;

    fn method(&self) -> PaymentMethod;
}
