//! Unified Error Taxonomy — Core Result Type
//!
//! Every use case and port in the crate signals failure through
//! `CoreError`. The variants mirror the four failure classes the
//! marketplace core distinguishes: caller contract violations,
//! missing entities, funds shortfalls, store failures, and gateway
//! failures. Gateway *declines* (a payment refused, a refund
//! rejected) are legitimate business outcomes and are NOT errors;
//! only transport/infrastructure failures surface here.

use thiserror::Error;

/// Result alias used across the ledger, payments and marketplace layers.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure taxonomy for the value-transfer core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller contract violation: same-party transfer, non-positive
    /// amount, insufficient stock, missing collection entry.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity (card, profile, payment intent) is absent.
    #[error("{0}")]
    NotFound(String),

    /// Wallet balance cannot cover the requested debit.
    #[error("Insufficient funds: balance {balance} < amount {amount}")]
    InsufficientFunds {
        /// Balance observed when the debit was rejected.
        balance: rust_decimal::Decimal,
        /// Amount the caller tried to debit.
        amount: rust_decimal::Decimal,
    },

    /// The persistence port call itself failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The payment gateway could not be reached or misbehaved.
    #[error("Gateway error: {0}")]
    Gateway(String),
}

impl CoreError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a not-found failure.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Shorthand for a persistence failure.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(format!("Row serialization failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validation_message_passthrough() {
        let err = CoreError::validation("Buyer and seller cannot be the same user");
        assert_eq!(
            err.to_string(),
            "Buyer and seller cannot be the same user"
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = CoreError::InsufficientFunds {
            balance: dec!(10.00),
            amount: dec!(25.00),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: balance 10.00 < amount 25.00"
        );
    }

    #[test]
    fn test_serde_error_maps_to_persistence() {
        let bad: Result<u32, _> = serde_json::from_str("not json");
        let err: CoreError = bad.unwrap_err().into();
        assert!(matches!(err, CoreError::Persistence(_)));
    }
}
