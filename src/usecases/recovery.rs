//! Recovery Sweeper — Orphaned Partial-State Cleanup
//!
//! The trade saga and the refund flow each have a window where the
//! process can die between two writes. This sweep closes both:
//!
//! 1. A `completed` Sale with no linked Purchase after the grace
//!    period is an orphan → voided.
//! 2. A `pending` Refund older than the grace period never heard back
//!    from the gateway → marked failed.
//!
//! The grace period keeps the sweep from racing trades and refunds
//! that are simply still in flight.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::listing::TradeStatus;
use crate::domain::payment::RefundStatus;
use crate::error::CoreResult;
use crate::ports::store::{Filter, Query, RecordStore};

const SALES: &str = "sales";
const PURCHASES: &str = "purchases";
const REFUNDS: &str = "refunds";

/// Aggregated result of one sweep pass.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Orphaned sales voided this pass.
    pub sales_voided: Vec<Uuid>,
    /// Stale pending refunds marked failed this pass.
    pub refunds_failed: Vec<Uuid>,
    /// Completed sales examined.
    pub sales_examined: usize,
    /// When the sweep ran.
    pub timestamp: DateTime<Utc>,
}

impl SweepReport {
    /// Whether the pass found nothing to repair.
    pub fn is_clean(&self) -> bool {
        self.sales_voided.is_empty() && self.refunds_failed.is_empty()
    }
}

/// Periodic repairer of orphaned partial states.
pub struct RecoverySweeper<S: RecordStore> {
    store: Arc<S>,
    /// Minimum age before a partial state counts as orphaned.
    grace: Duration,
}

impl<S: RecordStore> RecoverySweeper<S> {
    pub fn new(store: Arc<S>, grace_seconds: u64) -> Self {
        Self {
            store,
            grace: Duration::seconds(grace_seconds as i64),
        }
    }

    /// Run one full sweep over sales and refunds.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> CoreResult<SweepReport> {
        let cutoff = Utc::now() - self.grace;

        let sales = self
            .store
            .get_many(SALES, &Query::filtered(vec![Filter::eq("status", "completed")]))
            .await?;
        let sales_examined = sales.rows.len();

        let mut sales_voided = Vec::new();
        for sale in &sales.rows {
            if let Some(id) = self.orphaned_sale(sale, cutoff).await? {
                self.store
                    .update(
                        SALES,
                        &[Filter::eq("id", id.to_string())],
                        json!({ "status": TradeStatus::Voided }),
                    )
                    .await?;
                warn!(sale_id = %id, "Orphaned sale voided by sweep");
                sales_voided.push(id);
            }
        }

        let refunds = self
            .store
            .get_many(REFUNDS, &Query::filtered(vec![Filter::eq("status", "pending")]))
            .await?;
        let mut refunds_failed = Vec::new();
        for refund in &refunds.rows {
            let Some(id) = row_id(refund) else { continue };
            if row_older_than(refund, cutoff) {
                self.store
                    .update(
                        REFUNDS,
                        &[Filter::eq("id", id.to_string())],
                        json!({
                            "status": RefundStatus::Failed,
                            "updated_at": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;
                warn!(refund_id = %id, "Stale pending refund marked failed");
                refunds_failed.push(id);
            }
        }

        let report = SweepReport {
            sales_voided,
            refunds_failed,
            sales_examined,
            timestamp: Utc::now(),
        };

        info!(
            examined = report.sales_examined,
            voided = report.sales_voided.len(),
            refunds_failed = report.refunds_failed.len(),
            "Recovery sweep complete"
        );

        Ok(report)
    }

    /// A completed sale past the grace period with no purchase row.
    async fn orphaned_sale(&self, sale: &Value, cutoff: DateTime<Utc>) -> CoreResult<Option<Uuid>> {
        let Some(id) = row_id(sale) else {
            return Ok(None);
        };
        if !row_older_than(sale, cutoff) {
            return Ok(None);
        }
        let linked = self
            .store
            .count(PURCHASES, &[Filter::eq("transaction_id", id.to_string())])
            .await?;
        Ok((linked == 0).then_some(id))
    }
}

fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id")?.as_str()?.parse().ok()
}

fn row_older_than(row: &Value, cutoff: DateTime<Utc>) -> bool {
    row.get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .is_some_and(|t| t.with_timezone(&Utc) < cutoff)
}
