//! Order status machine and subject roles.
//!
//! ```text
//! Processing ──► Confirmed ──► OutForDelivery ──► Delivered
//!     │              │
//!     └──► Cancelled ◄┘
//! ```
//!
//! `Delivered` and `Cancelled` are terminal. Cancellation is not possible once
//! an order is out for delivery.

use serde::{Deserialize, Serialize};

use crate::CommerceError;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Processing,
    Confirmed,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Processing,
        Self::Confirmed,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether the graph has an edge from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::OutForDelivery | Self::Cancelled)
                | (Self::OutForDelivery, Self::Delivered)
        )
    }

    /// Check a transition, producing the caller-facing rejection.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidArgument` if there is no such edge.
    pub fn check_transition(self, next: Self) -> Result<(), CommerceError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CommerceError::invalid_argument(format!(
                "cannot move order from {self} to {next}"
            )))
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Role carried by an authenticated subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubjectRole {
    /// End customer: may manage their own cart and orders.
    #[default]
    Customer,
    /// Store staff: may list every order and advance fulfilment.
    Staff,
}

impl SubjectRole {
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Staff)
    }
}

impl std::fmt::Display for SubjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Staff => write!(f, "staff"),
        }
    }
}

impl std::str::FromStr for SubjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            _ => Err(format!("invalid subject role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::{Cancelled, Confirmed, Delivered, OutForDelivery, Processing};

    #[test]
    fn test_legal_transitions_are_exactly_the_graph() {
        let legal = [
            (Processing, Confirmed),
            (Processing, Cancelled),
            (Confirmed, OutForDelivery),
            (Confirmed, Cancelled),
            (OutForDelivery, Delivered),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_cancel_after_dispatch() {
        assert!(OutForDelivery.check_transition(Cancelled).is_err());
        assert!(Delivered.check_transition(Cancelled).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [Delivered, Cancelled] {
            assert!(OrderStatus::ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("Food Processing".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&OutForDelivery).unwrap_or_default();
        assert_eq!(json, "\"out_for_delivery\"");
    }

    #[test]
    fn test_role_privilege() {
        assert!(SubjectRole::Staff.is_privileged());
        assert!(!SubjectRole::Customer.is_privileged());
        assert_eq!("staff".parse::<SubjectRole>(), Ok(SubjectRole::Staff));
    }
}
