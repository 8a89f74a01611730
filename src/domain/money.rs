//! Monetary value objects.
//!
//! All amounts in the core are `rust_decimal::Decimal` — never floats.
//! `Amount` enforces positivity at construction so credit/debit/transfer
//! signatures cannot receive zero or negative values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default settlement currency for wallets created lazily.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A strictly positive monetary amount.
///
/// Construction is the only validation point; once an `Amount` exists
/// it can be trusted to be `> 0` everywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Create a positive amount.
    ///
    /// # Errors
    /// Returns `CoreError::Validation` for zero or negative values.
    pub fn new(value: Decimal) -> Result<Self, CoreError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CoreError::validation("Amount must be positive"))
        }
    }

    /// The underlying decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_positive_amount_accepted() {
        let amount = Amount::new(dec!(25.00)).unwrap();
        assert_eq!(amount.value(), dec!(25.00));
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert!(matches!(
            Amount::new(dec!(0)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(matches!(
            Amount::new(dec!(-0.01)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_display_preserves_scale() {
        let amount = Amount::new(dec!(50.00)).unwrap();
        assert_eq!(amount.to_string(), "50.00");
    }
}
