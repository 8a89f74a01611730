//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain types with port interfaces to implement the
//! marketplace core's workflows. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `WalletLedger`: balance reads, credit/debit ledger posts
//! - `TransferCoordinator`: two-party transfers with compensation
//! - `PaymentIntents`: external-payment lifecycle + refunds
//! - `TradeProcessor`: validated card sale/purchase recording
//! - `RecoverySweeper`: orphaned partial-state cleanup

pub mod marketplace;
pub mod payments;
pub mod recovery;
pub mod transfer;
pub mod wallet_ledger;

pub use marketplace::{TradeProcessor, TradeReceipt, TradeRequest};
pub use payments::{ConfirmOutcome, CreateIntent, PaymentIntents, RefundRequest};
pub use recovery::{RecoverySweeper, SweepReport};
pub use transfer::{TransferCoordinator, TransferReceipt};
pub use wallet_ledger::{PostOptions, WalletLedger};
