//! Payment gateway references.

use serde::{Deserialize, Serialize};

use crate::{CurrencyCode, Money, PaymentIntentId, Signature, TransactionId};

/// A gateway-side reservation of an amount awaiting completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub amount: Money,
    pub currency: CurrencyCode,
}

/// The completion report for an intent, as relayed by the client or the gateway.
///
/// Nothing in here is trusted until the signature has been authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub intent_id: PaymentIntentId,
    pub transaction_id: TransactionId,
    pub signature: Signature,
}

/// Which gateway captured an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Razorpay,
    Sandbox,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Razorpay => "razorpay",
            Self::Sandbox => "sandbox",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "razorpay" => Ok(Self::Razorpay),
            "sandbox" => Ok(Self::Sandbox),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
