//! Marketplace domain types: cards, collections, profiles, trades.
//!
//! `Sale` and `Purchase` are the paired records of one card trade.
//! A purchase always references exactly one sale; a sale whose
//! purchase was never created is an orphan and is voided by the
//! recovery sweep.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable catalog card referenced by trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

/// Ownership stock: how many copies of a card a user holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub user_id: String,
    pub card_id: String,
    pub quantity: u32,
}

/// Minimal marketplace profile; only existence matters to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
}

/// Status of a sale or purchase record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Completed,
    /// Set by compensation or the recovery sweep when the paired
    /// purchase could not be created.
    Voided,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Voided => write!(f, "voided"),
        }
    }
}

/// Seller-side record of a card trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub seller_id: String,
    pub card_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn completed(seller_id: &str, card_id: &str, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id: seller_id.to_string(),
            card_id: card_id.to_string(),
            quantity,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
            status: TradeStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// Buyer-side record; `transaction_id` links to its sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub buyer_id: String,
    pub card_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: TradeStatus,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn for_sale(sale: &Sale, buyer_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            buyer_id: buyer_id.to_string(),
            card_id: sale.card_id.clone(),
            quantity: sale.quantity,
            unit_price: sale.unit_price,
            total_price: sale.total_price,
            status: TradeStatus::Completed,
            transaction_id: sale.id,
            created_at: Utc::now(),
        }
    }
}
