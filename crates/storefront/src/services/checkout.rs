//! Checkout orchestration: place an order, settle it, advance it.
//!
//! # Place
//!
//! 1. Compare the submitted items with the stored cart (the stored cart wins)
//! 2. Price every line from the catalog and open the order in the ledger
//! 3. Create a gateway intent keyed by the order id and attach it
//!
//! If the gateway fails after step 2 the order stays `Processing` with no
//! intent. Placing again creates a new order.
//!
//! # Verify
//!
//! 1. Authenticate the callback signature; nothing is read or written before this
//! 2. Find the order by intent and, for a signed-in customer, check ownership
//! 3. Settle the order, then clear the subject's cart
//!
//! Cart clearing after settlement never fails the request. A replayed callback
//! clears the cart only while it still holds exactly the order's lines, so a
//! cart built after paying survives redelivered webhooks.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use forkful_core::ports::{
    AuthenticatedSubject, CartStore, CatalogLookup, OrderLedger, PaymentGateway,
};
use forkful_core::{
    CartLine, CommerceError, CurrencyCode, DeliveryAddress, Money, NewOrder, Order, OrderId,
    OrderLine, OrderStatus, PaymentCallback, PaymentIntentId, SettleOutcome, SubjectId,
};

use crate::config::CommerceConfig;
use crate::error::add_breadcrumb;

/// What the client submits at checkout.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<CartLine>,
    pub amount: Money,
    pub address: Option<DeliveryAddress>,
}

/// What the client needs to open the gateway checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_intent_id: PaymentIntentId,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub gateway_public_key: String,
}

/// Result of a successful verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// `true` when this callback had already been applied
    pub already_settled: bool,
}

/// Composes cart, catalog, ledger and gateway into the checkout protocol.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogLookup>,
    ledger: Arc<dyn OrderLedger>,
    gateway: Arc<dyn PaymentGateway>,
    commerce: CommerceConfig,
    gateway_timeout: Duration,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogLookup>,
        ledger: Arc<dyn OrderLedger>,
        gateway: Arc<dyn PaymentGateway>,
        commerce: CommerceConfig,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            carts,
            catalog,
            ledger,
            gateway,
            commerce,
            gateway_timeout,
        }
    }

    /// Open an order for the subject's cart and create its payment intent.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for empty or stale items, a wrong amount, or a missing address
    /// - `NotFound` if a cart item is no longer on the menu
    /// - `Unavailable` if storage or the gateway fails (the order stays `Processing`)
    #[instrument(skip_all, fields(subject = %subject.id))]
    pub async fn place(
        &self,
        subject: &AuthenticatedSubject,
        request: PlaceOrder,
    ) -> Result<PlacedOrder, CommerceError> {
        if request.items.is_empty() {
            return Err(CommerceError::invalid_argument("no items to order"));
        }

        let cart = self.carts.get(&subject.id).await?;
        if cart.is_empty() {
            return Err(CommerceError::invalid_argument("cart is empty"));
        }
        if !cart.matches_selection(&request.items) {
            return Err(CommerceError::invalid_argument(
                "cart has changed, review it and try again",
            ));
        }

        let mut lines = Vec::with_capacity(cart.line_count());
        for line in cart.lines() {
            let item = self.catalog.resolve(line.item_id).await?;
            lines.push(OrderLine {
                item_id: item.id,
                name: item.name,
                quantity: line.quantity,
                unit_price: item.unit_price,
            });
        }

        let order = self
            .ledger
            .create(NewOrder {
                subject: subject.id.clone(),
                lines,
                declared_amount: request.amount,
                delivery_fee: self.commerce.delivery_fee,
                currency: self.commerce.currency,
                address: request.address,
                payment_method: self.gateway.method(),
            })
            .await?;

        let intent = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway
                .create_intent(order.amount, order.currency, order.id),
        )
        .await
        .map_err(|_| {
            warn!(order_id = %order.id, "Payment intent creation timed out");
            CommerceError::unavailable("payment gateway timed out")
        })??;

        let order = self
            .ledger
            .attach_payment_intent(order.id, intent.id.clone())
            .await?;

        info!(order_id = %order.id, intent = %intent.id, amount = %order.amount, "Order placed");
        let order_ref = order.id.to_string();
        add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_ref.as_str())]));

        Ok(PlacedOrder {
            order_id: order.id,
            payment_intent_id: intent.id,
            amount: order.amount,
            currency: order.currency,
            gateway_public_key: self.gateway.public_key().to_string(),
        })
    }

    /// Settle the order a signed payment callback refers to.
    ///
    /// `caller` is `None` for gateway webhooks. A signed-in customer may only
    /// settle their own orders; staff may settle any.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the signature does not verify or the caller does not own the order
    /// - `NotFound` if no order carries the intent
    /// - `FailedPrecondition` if the order was paid by another transaction or is no longer payable
    #[instrument(skip_all, fields(intent = %callback.intent_id, transaction = %callback.transaction_id))]
    pub async fn verify(
        &self,
        caller: Option<&AuthenticatedSubject>,
        callback: PaymentCallback,
    ) -> Result<VerifiedPayment, CommerceError> {
        if !self.gateway.authenticate_callback(&callback) {
            warn!("Payment callback signature mismatch");
            return Err(CommerceError::permission_denied(
                "payment signature verification failed",
            ));
        }

        let order = self.ledger.find_by_intent(&callback.intent_id).await?;

        if let Some(caller) = caller
            && !caller.is_staff()
            && caller.id != order.subject
        {
            return Err(CommerceError::permission_denied(
                "order belongs to another customer",
            ));
        }

        let (order, outcome) = self.ledger.mark_settled(order.id, &callback).await?;
        match outcome {
            SettleOutcome::Settled => {
                info!(order_id = %order.id, "Payment captured");
                self.clear_cart_after_settlement(&order).await;
            }
            SettleOutcome::AlreadySettled => {
                info!(order_id = %order.id, "Payment callback already applied");
                if self.cart_still_holds(&order).await {
                    self.clear_cart_after_settlement(&order).await;
                }
            }
        }

        Ok(VerifiedPayment {
            order_id: order.id,
            status: order.status,
            already_settled: outcome == SettleOutcome::AlreadySettled,
        })
    }

    /// Whether the subject's cart is still exactly what the order bought.
    async fn cart_still_holds(&self, order: &Order) -> bool {
        let bought: Vec<CartLine> = order
            .lines
            .iter()
            .map(|line| CartLine {
                item_id: line.item_id,
                quantity: line.quantity,
            })
            .collect();
        match self.carts.get(&order.subject).await {
            Ok(cart) => !cart.is_empty() && cart.matches_selection(&bought),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Could not read cart on replayed callback");
                false
            }
        }
    }

    async fn clear_cart_after_settlement(&self, order: &Order) {
        if let Err(e) = self.carts.clear(&order.subject).await {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                order_id = %order.id,
                subject = %order.subject,
                error = %e,
                sentry_event_id = %event_id,
                "Failed to clear cart after settlement"
            );
        }
    }

    /// Move an order along the fulfilment graph.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an illegal transition, `NotFound` for an unknown order.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let order = self.ledger.update_status(order_id, status).await?;
        info!(order_id = %order.id, status = %order.status, "Order status updated");
        Ok(order)
    }

    /// The subject's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage fails.
    pub async fn orders_for(&self, subject: &SubjectId) -> Result<Vec<Order>, CommerceError> {
        self.ledger.list_by_subject(subject).await
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if storage fails.
    pub async fn all_orders(&self) -> Result<Vec<Order>, CommerceError> {
        self.ledger.list_all().await
    }
}
