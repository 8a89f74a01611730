//! Domain layer - Core business logic and models.
//!
//! This module contains the pure domain types of the marketplace core.
//! No store or gateway knowledge here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod listing;
pub mod money;
pub mod payment;
pub mod wallet;

// Re-export core types for convenience
pub use listing::{Card, CollectionEntry, Profile, Purchase, Sale, TradeStatus};
pub use money::{Amount, DEFAULT_CURRENCY};
pub use payment::{IntentStatus, PaymentIntent, Refund, RefundStatus};
pub use wallet::{BalanceSnapshot, EntryKind, PostedEntry, Wallet, WalletEntry};
