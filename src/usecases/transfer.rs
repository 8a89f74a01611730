//! Transfer Coordinator — Two-Party Fund Movement
//!
//! Composes two ledger posts (debit sender, credit recipient) into a
//! transfer with a defined compensation: if the credit leg fails after
//! the debit committed, the sender is re-credited and the credit
//! failure is surfaced as the transfer's error.
//!
//! Transfer flow:
//! 1. Read sender balance; fail fast on shortfall (no writes)
//! 2. Debit sender
//! 3. Credit recipient
//! 4. On credit failure: compensating credit back to the sender
//!
//! The compensating credit's own failure is logged, not surfaced — the
//! debit entry plus the error log are the recovery input for that edge.

use tracing::{error, info, instrument, warn};

use crate::domain::money::Amount;
use crate::domain::wallet::WalletEntry;
use crate::error::{CoreError, CoreResult};
use crate::ports::store::RecordStore;

use super::wallet_ledger::{PostOptions, WalletLedger};

/// Both ledger entries of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// Debit recorded against the sender.
    pub from_entry: WalletEntry,
    /// Credit recorded for the recipient.
    pub to_entry: WalletEntry,
}

/// Coordinates two-party transfers over one wallet ledger.
pub struct TransferCoordinator<S: RecordStore> {
    ledger: WalletLedger<S>,
}

impl<S: RecordStore> TransferCoordinator<S> {
    pub fn new(ledger: WalletLedger<S>) -> Self {
        Self { ledger }
    }

    /// Move `amount` from one user's wallet to another's.
    ///
    /// Success implies the sender's balance dropped and the
    /// recipient's rose by exactly `amount` (system total unchanged),
    /// with exactly one debit and one credit entry appended.
    #[instrument(skip(self, opts), fields(amount = %amount))]
    pub async fn transfer_funds(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        amount: Amount,
        description: &str,
        opts: PostOptions,
    ) -> CoreResult<TransferReceipt> {
        if from_user_id == to_user_id {
            return Err(CoreError::validation(
                "Cannot transfer funds to the same user",
            ));
        }

        // Fast-fail before any write; the debit re-checks atomically.
        // Keyed transfers skip it so a retried transfer replays its
        // legs instead of failing on the post-transfer balance.
        let snapshot = self.ledger.get_balance(from_user_id).await?;
        if opts.idempotency_key.is_none() && snapshot.balance < amount.value() {
            return Err(CoreError::InsufficientFunds {
                balance: snapshot.balance,
                amount: amount.value(),
            });
        }

        let debit = self
            .ledger
            .debit(
                from_user_id,
                amount,
                &format!("Transfer to {to_user_id}: {description}"),
                leg_options(&opts, "debit"),
            )
            .await?;

        let credit = match self
            .ledger
            .credit(
                to_user_id,
                amount,
                &format!("Transfer from {from_user_id}: {description}"),
                leg_options(&opts, "credit"),
            )
            .await
        {
            Ok(posted) => posted,
            Err(credit_err) => {
                warn!(
                    from_user_id,
                    to_user_id,
                    error = %credit_err,
                    "Credit leg failed, compensating sender"
                );
                let reversal = self
                    .ledger
                    .credit(
                        from_user_id,
                        amount,
                        &format!("Reversal of failed transfer: {description}"),
                        leg_options(&opts, "reversal"),
                    )
                    .await;
                if let Err(reversal_err) = reversal {
                    error!(
                        from_user_id,
                        debit_id = %debit.entry.id,
                        error = %reversal_err,
                        "Compensating credit failed; sender balance not restored"
                    );
                }
                return Err(credit_err);
            }
        };

        info!(
            from_user_id,
            to_user_id,
            amount = %amount,
            "Transfer completed"
        );

        Ok(TransferReceipt {
            from_entry: debit.entry,
            to_entry: credit.entry,
        })
    }
}

/// Derive per-leg options from the transfer's own options, so one
/// transfer-level idempotency key makes each leg retry-safe.
fn leg_options(opts: &PostOptions, leg: &str) -> PostOptions {
    PostOptions {
        reference_id: opts.reference_id.clone(),
        idempotency_key: opts
            .idempotency_key
            .as_ref()
            .map(|key| format!("{key}:{leg}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn coordinator() -> (Arc<MemoryStore>, TransferCoordinator<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = WalletLedger::new(Arc::clone(&store));
        (store, TransferCoordinator::new(ledger))
    }

    fn amount(v: rust_decimal::Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    async fn fund(store: &Arc<MemoryStore>, user: &str, value: rust_decimal::Decimal) {
        let ledger = WalletLedger::new(Arc::clone(store));
        ledger
            .credit(user, amount(value), "seed", PostOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transfer_moves_exact_amount() {
        let (store, coordinator) = coordinator();
        fund(&store, "alice", dec!(100.00)).await;

        let receipt = coordinator
            .transfer_funds("alice", "bob", amount(dec!(30.00)), "card trade", PostOptions::default())
            .await
            .unwrap();

        let ledger = WalletLedger::new(Arc::clone(&store));
        assert_eq!(ledger.get_balance("alice").await.unwrap().balance, dec!(70.00));
        assert_eq!(ledger.get_balance("bob").await.unwrap().balance, dec!(30.00));
        assert_eq!(receipt.from_entry.amount, dec!(30.00));
        assert!(receipt.to_entry.description.contains("Transfer from alice"));
    }

    #[tokio::test]
    async fn test_transfer_appends_exactly_two_entries() {
        let (store, coordinator) = coordinator();
        fund(&store, "alice", dec!(50.00)).await;
        let before = store.dump("wallet_transactions").await.len();

        coordinator
            .transfer_funds("alice", "bob", amount(dec!(10.00)), "trade", PostOptions::default())
            .await
            .unwrap();

        assert_eq!(store.dump("wallet_transactions").await.len(), before + 2);
    }

    #[tokio::test]
    async fn test_insufficient_funds_writes_nothing() {
        let (store, coordinator) = coordinator();
        fund(&store, "alice", dec!(5.00)).await;
        let before = store.dump("wallet_transactions").await.len();

        let err = coordinator
            .transfer_funds("alice", "bob", amount(dec!(50.00)), "trade", PostOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert_eq!(store.dump("wallet_transactions").await.len(), before);
        let ledger = WalletLedger::new(Arc::clone(&store));
        assert_eq!(ledger.get_balance("alice").await.unwrap().balance, dec!(5.00));
    }

    #[tokio::test]
    async fn test_same_party_transfer_rejected() {
        let (_, coordinator) = coordinator();
        let err = coordinator
            .transfer_funds("alice", "alice", amount(dec!(1.00)), "self", PostOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transfer_idempotency_key_fans_out_per_leg() {
        let (store, coordinator) = coordinator();
        fund(&store, "alice", dec!(100.00)).await;
        let opts = PostOptions::idempotent("tx-99");

        coordinator
            .transfer_funds("alice", "bob", amount(dec!(25.00)), "trade", opts.clone())
            .await
            .unwrap();
        // Retry with the same key: both legs replay, nothing re-applies.
        coordinator
            .transfer_funds("alice", "bob", amount(dec!(25.00)), "trade", opts)
            .await
            .unwrap();

        let ledger = WalletLedger::new(Arc::clone(&store));
        assert_eq!(ledger.get_balance("alice").await.unwrap().balance, dec!(75.00));
        assert_eq!(ledger.get_balance("bob").await.unwrap().balance, dec!(25.00));
    }
}
