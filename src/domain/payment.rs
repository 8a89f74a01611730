//! Payment intent and refund domain types.
//!
//! A `PaymentIntent` models one attempted external payment progressing
//! through a fixed state machine; a `Refund` references a succeeded
//! intent. State transitions are driven by `usecases::payments`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Amount;

/// Payment intent lifecycle states.
///
/// `Succeeded` and `Canceled` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    Processing,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    /// Whether a cancel request may transition this state.
    pub fn cancelable(&self) -> bool {
        matches!(self, Self::RequiresPaymentMethod | Self::RequiresConfirmation)
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// One attempted external payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    pub payment_method_id: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Create a new intent in `requires_payment_method`.
    ///
    /// The client secret is synthesized by the use case after the id
    /// exists, so it starts out `None` here.
    pub fn new(
        amount: Amount,
        currency: &str,
        payment_method_id: Option<String>,
        customer_id: Option<String>,
        description: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            amount: amount.value(),
            currency: currency.to_string(),
            status: IntentStatus::RequiresPaymentMethod,
            client_secret: None,
            payment_method_id,
            customer_id,
            description,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Refund lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A refund attempt against a succeeded payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_intent_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    /// Create a pending refund against a succeeded intent.
    pub fn pending(intent: &PaymentIntent, amount: Decimal, reason: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            payment_intent_id: intent.id,
            amount,
            currency: intent.currency.clone(),
            reason,
            status: RefundStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
