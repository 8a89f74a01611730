//! Trade Processor Use Case — Card Sale/Purchase Recording
//!
//! Validates a card trade and records its sale/purchase pair. Every
//! precondition fails fast with a specific message and no writes:
//! distinct parties, card exists, seller owns enough stock, buyer
//! profile exists, buyer wallet covers the total.
//!
//! The store offers no cross-row transaction, so the pair is written
//! as a saga: Sale first, then the Purchase referencing it. If the
//! Purchase write fails, the Sale is voided in compensation; a void
//! that itself fails leaves an orphan for the recovery sweep.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::domain::listing::{Card, CollectionEntry, Purchase, Sale, TradeStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::store::{Filter, RecordStore};

use super::wallet_ledger::WalletLedger;

const CARDS: &str = "cards";
const COLLECTIONS: &str = "collections";
const PROFILES: &str = "profiles";
const SALES: &str = "sales";
const PURCHASES: &str = "purchases";

/// A requested card trade between two users.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub buyer_id: String,
    pub seller_id: String,
    pub card_id: String,
    pub quantity: u32,
    /// Unit price agreed for this trade.
    pub price: Decimal,
}

/// The recorded sale/purchase pair of a completed trade.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub sale: Sale,
    pub purchase: Purchase,
}

/// Validates and records card trades.
pub struct TradeProcessor<S: RecordStore> {
    store: Arc<S>,
    /// Single balance authority for buyer solvency checks.
    ledger: WalletLedger<S>,
}

impl<S: RecordStore> TradeProcessor<S> {
    pub fn new(store: Arc<S>, ledger: WalletLedger<S>) -> Self {
        Self { store, ledger }
    }

    /// Execute a trade: validate, record the Sale, record the Purchase.
    #[instrument(skip(self, request), fields(card_id = %request.card_id, quantity = request.quantity))]
    pub async fn execute(&self, request: TradeRequest) -> CoreResult<TradeReceipt> {
        self.validate(&request).await?;

        let sale = Sale::completed(
            &request.seller_id,
            &request.card_id,
            request.quantity,
            request.price,
        );
        let created = self
            .store
            .create(SALES, serde_json::to_value(&sale)?)
            .await?;
        let sale: Sale = serde_json::from_value(created)?;

        let purchase = Purchase::for_sale(&sale, &request.buyer_id);
        let created = match self
            .store
            .create(PURCHASES, serde_json::to_value(&purchase)?)
            .await
        {
            Ok(row) => row,
            Err(purchase_err) => {
                warn!(
                    sale_id = %sale.id,
                    error = %purchase_err,
                    "Purchase creation failed, voiding sale"
                );
                self.void_sale(&sale).await;
                return Err(purchase_err);
            }
        };
        let purchase: Purchase = serde_json::from_value(created)?;

        info!(
            sale_id = %sale.id,
            purchase_id = %purchase.id,
            total = %sale.total_price,
            "Trade recorded"
        );

        Ok(TradeReceipt { sale, purchase })
    }

    /// Ordered precondition checks; each failure leaves no writes.
    async fn validate(&self, request: &TradeRequest) -> CoreResult<()> {
        if request.buyer_id == request.seller_id {
            return Err(CoreError::validation(
                "Buyer and seller cannot be the same user",
            ));
        }

        let card = self
            .store
            .get_one(CARDS, &[Filter::eq("id", request.card_id.as_str())])
            .await?
            .ok_or_else(|| CoreError::not_found("Card not found"))?;
        let _card: Card = serde_json::from_value(card)?;

        let entry = self
            .store
            .get_one(
                COLLECTIONS,
                &[
                    Filter::eq("user_id", request.seller_id.as_str()),
                    Filter::eq("card_id", request.card_id.as_str()),
                ],
            )
            .await?
            .ok_or_else(|| CoreError::validation("Seller does not own this card"))?;
        let entry: CollectionEntry = serde_json::from_value(entry)?;
        if entry.quantity < request.quantity {
            return Err(CoreError::validation(
                "Seller does not have enough cards in stock",
            ));
        }

        self.store
            .get_one(PROFILES, &[Filter::eq("id", request.buyer_id.as_str())])
            .await?
            .ok_or_else(|| CoreError::not_found("Buyer profile not found"))?;

        let total = request.price * Decimal::from(request.quantity);
        let snapshot = self.ledger.get_balance(&request.buyer_id).await?;
        if snapshot.balance < total {
            return Err(CoreError::validation("Insufficient balance"));
        }

        Ok(())
    }

    /// Compensation: mark the orphaned sale voided. A failure here is
    /// logged and left to the recovery sweep.
    async fn void_sale(&self, sale: &Sale) {
        let result = self
            .store
            .update(
                SALES,
                &[Filter::eq("id", sale.id.to_string())],
                serde_json::json!({ "status": TradeStatus::Voided }),
            )
            .await;
        match result {
            Ok(rows) if !rows.is_empty() => {
                info!(sale_id = %sale.id, "Orphaned sale voided");
            }
            Ok(_) => {
                error!(sale_id = %sale.id, "Orphaned sale not found during void");
            }
            Err(e) => {
                error!(
                    sale_id = %sale.id,
                    error = %e,
                    "Failed to void orphaned sale; recovery sweep will retry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryStore;
    use crate::usecases::wallet_ledger::PostOptions;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn seeded() -> (Arc<MemoryStore>, TradeProcessor<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "cards",
                vec![json!({"id": "card_blitz", "name": "Blitz Dragon", "price": "25.00"})],
            )
            .await;
        store
            .seed(
                "collections",
                vec![json!({"user_id": "seller_1", "card_id": "card_blitz", "quantity": 3})],
            )
            .await;
        store
            .seed(
                "profiles",
                vec![
                    json!({"id": "buyer_1", "username": "buyer"}),
                    json!({"id": "seller_1", "username": "seller"}),
                ],
            )
            .await;
        let ledger = WalletLedger::new(Arc::clone(&store));
        let processor = TradeProcessor::new(Arc::clone(&store), ledger);
        (store, processor)
    }

    async fn fund(store: &Arc<MemoryStore>, user: &str, value: rust_decimal::Decimal) {
        WalletLedger::new(Arc::clone(store))
            .credit(user, Amount::new(value).unwrap(), "seed", PostOptions::default())
            .await
            .unwrap();
    }

    fn request(quantity: u32, price: rust_decimal::Decimal) -> TradeRequest {
        TradeRequest {
            buyer_id: "buyer_1".to_string(),
            seller_id: "seller_1".to_string(),
            card_id: "card_blitz".to_string(),
            quantity,
            price,
        }
    }

    #[tokio::test]
    async fn test_exact_balance_trade_succeeds() {
        let (store, processor) = seeded().await;
        fund(&store, "buyer_1", dec!(50.00)).await;

        let receipt = processor.execute(request(2, dec!(25.00))).await.unwrap();
        assert_eq!(receipt.sale.total_price, dec!(50.00));
        assert_eq!(receipt.purchase.total_price, dec!(50.00));
        assert_eq!(receipt.purchase.transaction_id, receipt.sale.id);
        assert_eq!(store.dump("sales").await.len(), 1);
        assert_eq!(store.dump("purchases").await.len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_balance_writes_nothing() {
        let (store, processor) = seeded().await;
        fund(&store, "buyer_1", dec!(150.00)).await;

        let err = processor.execute(request(2, dec!(100.00))).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient balance");
        assert!(store.dump("sales").await.is_empty());
        assert!(store.dump("purchases").await.is_empty());
    }

    #[tokio::test]
    async fn test_stock_checked_before_balance() {
        let (store, processor) = seeded().await;
        // No funding at all: if balance were checked first this would
        // report the wrong error.
        let err = processor.execute(request(5, dec!(25.00))).await.unwrap_err();
        assert_eq!(err.to_string(), "Seller does not have enough cards in stock");
        assert!(store.dump("sales").await.is_empty());
    }

    #[tokio::test]
    async fn test_same_party_rejected_first() {
        let (_, processor) = seeded().await;
        let mut req = request(1, dec!(25.00));
        req.buyer_id = "seller_1".to_string();
        let err = processor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Buyer and seller cannot be the same user");
    }

    #[tokio::test]
    async fn test_unknown_card_rejected() {
        let (_, processor) = seeded().await;
        let mut req = request(1, dec!(25.00));
        req.card_id = "card_missing".to_string();
        let err = processor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Card not found");
    }

    #[tokio::test]
    async fn test_seller_without_collection_rejected() {
        let (store, processor) = seeded().await;
        store
            .seed("profiles", vec![json!({"id": "seller_2", "username": "other"})])
            .await;
        let mut req = request(1, dec!(25.00));
        req.seller_id = "seller_2".to_string();
        let err = processor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Seller does not own this card");
    }

    #[tokio::test]
    async fn test_missing_buyer_profile_rejected() {
        let (_, processor) = seeded().await;
        let mut req = request(1, dec!(25.00));
        req.buyer_id = "ghost".to_string();
        let err = processor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Buyer profile not found");
    }
}
