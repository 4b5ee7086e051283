//! Orders: creation rules, settlement and fulfilment transitions.
//!
//! Ledger implementations persist [`Order`] values but never change one
//! except through [`Order::attach_payment_intent`], [`Order::settle`] and
//! [`Order::advance`], which enforce:
//!
//! - lines, amount, delivery fee, address and creation time never change
//! - the payment intent is set at most once
//! - payment capture flips false to true exactly once, together with
//!   `Processing -> Confirmed`, and only for the order's own intent
//! - a captured transaction id is never overwritten

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    CommerceError, CurrencyCode, MenuItemId, Money, OrderId, OrderStatus, PaymentCallback,
    PaymentIntentId, PaymentMethod, Signature, SubjectId, TransactionId,
};

/// Snapshot of one priced line, captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: MenuItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// `quantity × unit_price`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Where the order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl DeliveryAddress {
    /// Check the fields a courier cannot do without.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first blank required field.
    pub fn validate(&self) -> Result<(), CommerceError> {
        let required = [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CommerceError::invalid_argument(format!(
                    "address {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Sum of line totals plus the delivery fee.
///
/// # Errors
///
/// Returns `InvalidArgument` if the arithmetic overflows.
pub fn order_total(lines: &[OrderLine], delivery_fee: Money) -> Result<Money, CommerceError> {
    let overflow = || CommerceError::invalid_argument("order total is too large");
    lines.iter().try_fold(delivery_fee, |acc, line| {
        line.line_total()
            .and_then(|t| acc.checked_add(t))
            .ok_or_else(overflow)
    })
}

/// Everything the ledger needs to open an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub subject: SubjectId,
    pub lines: Vec<OrderLine>,
    pub declared_amount: Money,
    pub delivery_fee: Money,
    pub currency: CurrencyCode,
    pub address: Option<DeliveryAddress>,
    pub payment_method: PaymentMethod,
}

/// Outcome of a successful [`Order::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call captured the payment.
    Settled,
    /// The same transaction had already been captured; nothing changed.
    AlreadySettled,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub subject: SubjectId,
    pub lines: Vec<OrderLine>,
    pub amount: Money,
    pub delivery_fee: Money,
    pub currency: CurrencyCode,
    pub address: DeliveryAddress,
    pub status: OrderStatus,
    pub payment_captured: bool,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<PaymentIntentId>,
    pub transaction_id: Option<TransactionId>,
    #[serde(skip_serializing)]
    pub signature: Option<Signature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate `new` and open it as a `Processing`, unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if there are no lines, a line has zero
    /// quantity or a negative price, the declared amount is not positive or
    /// differs from the computed total, or the address is missing or incomplete.
    pub fn open(new: NewOrder, now: DateTime<Utc>) -> Result<Self, CommerceError> {
        if new.lines.is_empty() {
            return Err(CommerceError::invalid_argument("no items to order"));
        }
        if let Some(line) = new
            .lines
            .iter()
            .find(|l| l.quantity == 0 || l.unit_price.minor() < 0)
        {
            return Err(CommerceError::invalid_argument(format!(
                "invalid line for {}",
                line.name
            )));
        }
        if new.delivery_fee.minor() < 0 {
            return Err(CommerceError::invalid_argument(
                "delivery fee cannot be negative",
            ));
        }
        if !new.declared_amount.is_positive() {
            return Err(CommerceError::invalid_argument("invalid amount"));
        }
        let computed = order_total(&new.lines, new.delivery_fee)?;
        if computed != new.declared_amount {
            return Err(CommerceError::invalid_argument(format!(
                "amount {} does not match order total {}",
                new.declared_amount, computed
            )));
        }
        let address = new
            .address
            .ok_or_else(|| CommerceError::invalid_argument("address is required"))?;
        address.validate()?;

        Ok(Self {
            id: OrderId::new(),
            subject: new.subject,
            lines: new.lines,
            amount: computed,
            delivery_fee: new.delivery_fee,
            currency: new.currency,
            address,
            status: OrderStatus::Processing,
            payment_captured: false,
            payment_method: new.payment_method,
            payment_intent_id: None,
            transaction_id: None,
            signature: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record the gateway intent created for this order.
    ///
    /// # Errors
    ///
    /// Returns `FailedPrecondition` if an intent is already attached.
    pub fn attach_payment_intent(
        &mut self,
        intent: PaymentIntentId,
        now: DateTime<Utc>,
    ) -> Result<(), CommerceError> {
        if self.payment_intent_id.is_some() {
            return Err(CommerceError::failed_precondition(
                "payment intent already attached to this order",
            ));
        }
        self.payment_intent_id = Some(intent);
        self.updated_at = now;
        Ok(())
    }

    /// Capture payment for an authenticated callback.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` if the callback's intent is not this order's intent
    /// - `FailedPrecondition` if a different transaction was already captured,
    ///   or the order is no longer `Processing`
    pub fn settle(
        &mut self,
        callback: &PaymentCallback,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome, CommerceError> {
        if self.payment_intent_id.as_ref() != Some(&callback.intent_id) {
            return Err(CommerceError::permission_denied(
                "payment intent does not belong to this order",
            ));
        }

        if self.payment_captured {
            return if self.transaction_id.as_ref() == Some(&callback.transaction_id) {
                Ok(SettleOutcome::AlreadySettled)
            } else {
                Err(CommerceError::failed_precondition(
                    "order was already paid by a different transaction",
                ))
            };
        }

        if self.status != OrderStatus::Processing {
            return Err(CommerceError::failed_precondition(format!(
                "order is {} and can no longer be paid",
                self.status
            )));
        }

        self.status = OrderStatus::Confirmed;
        self.payment_captured = true;
        self.transaction_id = Some(callback.transaction_id.clone());
        self.signature = Some(callback.signature.clone());
        self.updated_at = now;
        Ok(SettleOutcome::Settled)
    }

    /// Move the order along the fulfilment graph.
    ///
    /// `Confirmed` is only reachable through [`Order::settle`], since it must
    /// coincide with payment capture.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an edge that is not in the graph or a
    /// manual confirmation.
    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), CommerceError> {
        self.status.check_transition(next)?;
        if next == OrderStatus::Confirmed {
            return Err(CommerceError::invalid_argument(
                "orders are confirmed by payment settlement",
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            name: "Asha Rao".to_string(),
            email: Some("asha@example.com".to_string()),
            phone: Some("+91 98765 43210".to_string()),
            street: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: Some("KA".to_string()),
            postal_code: "560001".to_string(),
            country: "India".to_string(),
        }
    }

    fn new_order(quantity: u32, unit: i64, declared: i64) -> NewOrder {
        NewOrder {
            subject: SubjectId::parse("subject-1").unwrap(),
            lines: vec![OrderLine {
                item_id: MenuItemId::new(),
                name: "Masala Dosa".to_string(),
                quantity,
                unit_price: Money::from_minor(unit),
            }],
            declared_amount: Money::from_minor(declared),
            delivery_fee: Money::from_minor(30),
            currency: CurrencyCode::INR,
            address: Some(address()),
            payment_method: PaymentMethod::Sandbox,
        }
    }

    fn callback(intent: &str, txn: &str) -> PaymentCallback {
        PaymentCallback {
            intent_id: PaymentIntentId::parse(intent).unwrap(),
            transaction_id: TransactionId::parse(txn).unwrap(),
            signature: Signature::parse("abc123").unwrap(),
        }
    }

    fn opened() -> Order {
        let mut order = Order::open(new_order(2, 100, 230), Utc::now()).unwrap();
        order
            .attach_payment_intent(PaymentIntentId::parse("intent_1").unwrap(), Utc::now())
            .unwrap();
        order
    }

    #[test]
    fn test_open_computes_total_with_fee() {
        let order = Order::open(new_order(2, 100, 230), Utc::now()).unwrap();
        assert_eq!(order.amount, Money::from_minor(230));
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(!order.payment_captured);
        assert!(order.payment_intent_id.is_none());
    }

    #[test]
    fn test_open_rejects_mismatched_amount() {
        let err = Order::open(new_order(2, 100, 200), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_open_rejects_empty_lines_and_missing_address() {
        let mut empty = new_order(1, 100, 130);
        empty.lines.clear();
        assert!(Order::open(empty, Utc::now()).is_err());

        let mut homeless = new_order(1, 100, 130);
        homeless.address = None;
        assert!(Order::open(homeless, Utc::now()).is_err());

        let mut partial = new_order(1, 100, 130);
        partial.address = Some(DeliveryAddress {
            city: "  ".to_string(),
            ..address()
        });
        assert!(Order::open(partial, Utc::now()).is_err());
    }

    #[test]
    fn test_open_rejects_non_positive_amount() {
        assert!(Order::open(new_order(1, 0, 0), Utc::now()).is_err());
    }

    #[test]
    fn test_intent_attaches_once() {
        let mut order = opened();
        let err = order
            .attach_payment_intent(PaymentIntentId::parse("intent_2").unwrap(), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(order.payment_intent_id.unwrap().as_str(), "intent_1");
    }

    #[test]
    fn test_settle_confirms_and_captures() {
        let mut order = opened();
        let outcome = order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        assert_eq!(outcome, SettleOutcome::Settled);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.payment_captured);
        assert_eq!(order.transaction_id.as_ref().unwrap().as_str(), "pay_1");
    }

    #[test]
    fn test_settle_same_transaction_is_idempotent() {
        let mut order = opened();
        order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        let before = order.clone();
        let outcome = order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        assert_eq!(outcome, SettleOutcome::AlreadySettled);
        assert_eq!(order, before);
    }

    #[test]
    fn test_settle_different_transaction_conflicts() {
        let mut order = opened();
        order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        let err = order.settle(&callback("intent_1", "pay_2"), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(order.transaction_id.unwrap().as_str(), "pay_1");
    }

    #[test]
    fn test_settle_foreign_intent_is_denied() {
        let mut order = opened();
        let err = order.settle(&callback("intent_9", "pay_1"), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(!order.payment_captured);
    }

    #[test]
    fn test_settle_cancelled_order_fails() {
        let mut order = opened();
        order.advance(OrderStatus::Cancelled, Utc::now()).unwrap();
        let err = order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert!(!order.payment_captured);
    }

    #[test]
    fn test_advance_follows_graph() {
        let mut order = opened();
        order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        order.advance(OrderStatus::OutForDelivery, Utc::now()).unwrap();
        assert!(order.advance(OrderStatus::Cancelled, Utc::now()).is_err());
        order.advance(OrderStatus::Delivered, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.payment_captured);
    }

    #[test]
    fn test_advance_cannot_confirm_manually() {
        let mut order = opened();
        let err = order.advance(OrderStatus::Confirmed, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(!order.payment_captured);
    }

    #[test]
    fn test_signature_not_serialized() {
        let mut order = opened();
        order.settle(&callback("intent_1", "pay_1"), Utc::now()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("signature").is_none());
        assert_eq!(json["status"], "confirmed");
    }
}
