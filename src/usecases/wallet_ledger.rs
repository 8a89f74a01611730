//! Wallet Ledger Use Case — Balance Reads and Ledger Posts
//!
//! Owns the per-(user, currency) wallets and the append-only
//! transaction log. Every credit/debit goes through the store's
//! `wallet_post` procedure, which applies the overdraft check, the
//! idempotency check, the log append and the balance delta as one
//! store-side operation — two concurrent debits can never jointly
//! overdraw a wallet, and a retried post is returned, not re-applied.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument};

use crate::domain::money::{Amount, DEFAULT_CURRENCY};
use crate::domain::wallet::{BalanceSnapshot, EntryKind, PostedEntry, Wallet, WalletEntry};
use crate::error::{CoreError, CoreResult};
use crate::ports::store::{Filter, RecordStore};

const WALLETS: &str = "wallets";

/// Optional attributes of a ledger post.
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    /// Links the entry to a sale, purchase or transfer.
    pub reference_id: Option<String>,
    /// Retry-safety token; a reused key returns the original entry.
    pub idempotency_key: Option<String>,
}

impl PostOptions {
    pub fn reference(reference_id: impl Into<String>) -> Self {
        Self {
            reference_id: Some(reference_id.into()),
            ..Self::default()
        }
    }

    pub fn idempotent(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(key.into()),
            ..Self::default()
        }
    }
}

/// Ledger over the record store; cheap to clone, shares the store.
pub struct WalletLedger<S: RecordStore> {
    store: Arc<S>,
    currency: String,
}

impl<S: RecordStore> Clone for WalletLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            currency: self.currency.clone(),
        }
    }
}

impl<S: RecordStore> WalletLedger<S> {
    /// Create a ledger posting in the default currency.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_currency(store, DEFAULT_CURRENCY)
    }

    /// Create a ledger posting in a specific currency.
    pub fn with_currency(store: Arc<S>, currency: &str) -> Self {
        Self {
            store,
            currency: currency.to_string(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Read a wallet's balance, creating the wallet lazily at zero.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: &str) -> CoreResult<BalanceSnapshot> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::eq("currency", self.currency.as_str()),
        ];
        if let Some(row) = self.store.get_one(WALLETS, &filters).await? {
            let wallet: Wallet = serde_json::from_value(row)?;
            return Ok(BalanceSnapshot::from(&wallet));
        }

        let wallet = Wallet::empty(user_id, &self.currency);
        let created = self
            .store
            .create(WALLETS, serde_json::to_value(&wallet)?)
            .await?;
        let wallet: Wallet = serde_json::from_value(created)?;
        info!(user_id, currency = %self.currency, "Wallet created lazily");
        Ok(BalanceSnapshot::from(&wallet))
    }

    /// Append a credit entry and increase the balance.
    #[instrument(skip(self, opts), fields(amount = %amount))]
    pub async fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        description: &str,
        opts: PostOptions,
    ) -> CoreResult<PostedEntry> {
        self.post(user_id, EntryKind::Credit, amount, description, opts)
            .await
    }

    /// Append a debit entry and decrease the balance.
    ///
    /// Fails with `InsufficientFunds` when the balance cannot cover
    /// the amount; no row is written in that case.
    #[instrument(skip(self, opts), fields(amount = %amount))]
    pub async fn debit(
        &self,
        user_id: &str,
        amount: Amount,
        description: &str,
        opts: PostOptions,
    ) -> CoreResult<PostedEntry> {
        // Fast-fail on an already-visible shortfall (also creates the
        // wallet lazily); the procedure re-checks authoritatively.
        // Keyed posts skip the fast-fail: a replayed debit must return
        // the original entry even if the balance has since dropped.
        let snapshot = self.get_balance(user_id).await?;
        if opts.idempotency_key.is_none() && snapshot.balance < amount.value() {
            return Err(CoreError::InsufficientFunds {
                balance: snapshot.balance,
                amount: amount.value(),
            });
        }
        self.post(user_id, EntryKind::Debit, amount, description, opts)
            .await
    }

    async fn post(
        &self,
        user_id: &str,
        kind: EntryKind,
        amount: Amount,
        description: &str,
        opts: PostOptions,
    ) -> CoreResult<PostedEntry> {
        let entry = WalletEntry::new(
            user_id,
            kind,
            amount,
            &self.currency,
            description,
            opts.reference_id,
            opts.idempotency_key,
        );

        let params = json!({
            "entry": serde_json::to_value(&entry)?,
            "require_funds": kind == EntryKind::Debit,
        });
        let result = self.store.rpc("wallet_post", params).await?;

        let recorded: WalletEntry = serde_json::from_value(
            result
                .get("transaction")
                .cloned()
                .ok_or_else(|| CoreError::persistence("wallet_post returned no transaction"))?,
        )?;
        let new_balance = result
            .get("balance")
            .and_then(|b| b.as_str())
            .and_then(|b| b.parse().ok())
            .ok_or_else(|| CoreError::persistence("wallet_post returned no balance"))?;

        info!(
            user_id,
            kind = %recorded.kind,
            amount = %recorded.amount,
            new_balance = %new_balance,
            "Ledger entry posted"
        );

        Ok(PostedEntry {
            entry: recorded,
            new_balance,
        })
    }
}
