//! Money in integer minor currency units.
//!
//! Every amount that crosses a component boundary is a whole number of minor
//! units (paise, cents). Decimal major-unit values appear only at the edges:
//! seeding the menu from a human-written file.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// An amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Multiply a unit price by a line quantity.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Convert a major-unit decimal (e.g. `12.50`) into minor units.
    ///
    /// Returns `None` if the value has more precision than the currency
    /// supports or does not fit.
    #[must_use]
    pub fn from_major(amount: Decimal, currency: CurrencyCode) -> Option<Self> {
        let scaled = amount.checked_mul(Decimal::from(currency.minor_per_major()))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        scaled.to_i64().map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency codes accepted by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Minor units per major unit; every accepted currency has two decimals.
    const fn minor_per_major(self) -> i64 {
        100
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_from_major_exact() {
        let m = Money::from_major(Decimal::from_str("12.50").unwrap(), CurrencyCode::INR);
        assert_eq!(m, Some(Money::from_minor(1250)));
    }

    #[test]
    fn test_from_major_rejects_sub_minor_precision() {
        let m = Money::from_major(Decimal::from_str("0.005").unwrap(), CurrencyCode::USD);
        assert_eq!(m, None);
    }

    #[test]
    fn test_checked_arithmetic() {
        let unit = Money::from_minor(100);
        assert_eq!(unit.checked_mul(2), Some(Money::from_minor(200)));
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
        assert_eq!(
            Money::from_minor(200).checked_add(Money::from_minor(30)),
            Some(Money::from_minor(230))
        );
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
