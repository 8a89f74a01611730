//! Wallet ledger domain types.
//!
//! A `Wallet` is the per-(user, currency) balance row; a `WalletEntry`
//! is one immutable line of the append-only transaction log. Entries
//! are created exactly once per successful credit or debit and are
//! never mutated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Amount;

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Debit => write!(f, "debit"),
        }
    }
}

/// Per-(user, currency) balance record.
///
/// Invariant: `balance >= 0` at all observable times. Created lazily
/// with a zero balance on first read; mutated only through the
/// `wallet_post` store procedure; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub currency: String,
    pub balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Wallet {
    /// A fresh zero-balance wallet for lazy creation on first read.
    pub fn empty(user_id: &str, currency: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            currency: currency.to_string(),
            balance: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }
}

/// Immutable ledger entry appended by every successful credit/debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    /// Links the entry to a sale, purchase or transfer.
    pub reference_id: Option<String>,
    /// Caller-supplied retry-safety token; the store procedure
    /// returns the original entry on a key collision.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletEntry {
    pub fn new(
        user_id: &str,
        kind: EntryKind,
        amount: Amount,
        currency: &str,
        description: &str,
        reference_id: Option<String>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind,
            amount: amount.value(),
            currency: currency.to_string(),
            description: description.to_string(),
            reference_id,
            idempotency_key,
            created_at: Utc::now(),
        }
    }

    /// The signed balance delta this entry applies to its wallet.
    pub fn signed_delta(&self) -> Decimal {
        match self.kind {
            EntryKind::Credit => self.amount,
            EntryKind::Debit => -self.amount,
        }
    }
}

/// Balance snapshot returned by `WalletLedger::get_balance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub balance: Decimal,
    pub currency: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&Wallet> for BalanceSnapshot {
    fn from(wallet: &Wallet) -> Self {
        Self {
            balance: wallet.balance,
            currency: wallet.currency.clone(),
            last_updated: wallet.last_updated,
        }
    }
}

/// Outcome of a successful credit or debit.
#[derive(Debug, Clone)]
pub struct PostedEntry {
    /// The ledger entry recorded by the store procedure.
    pub entry: WalletEntry,
    /// Wallet balance after the entry was applied.
    pub new_balance: Decimal,
}
