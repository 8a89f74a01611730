//! Payment Intents Use Case — External-Payment Lifecycle
//!
//! Drives the intent state machine (create → confirm → terminal) and
//! refunds against the injected gateway port. Gateway declines are
//! terminal business outcomes (`canceled` intent, `failed` refund),
//! never errors; only store/gateway infrastructure failures surface
//! as `CoreError`.
//!
//! Client secrets are derived, not stored server-side: HMAC-SHA256 of
//! the intent id under the service secret, base64-encoded. The same
//! derivation re-produces the same secret, so no secret material ever
//! lands in a row.

use std::sync::Arc;

use base64::Engine;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::money::Amount;
use crate::domain::payment::{IntentStatus, PaymentIntent, Refund, RefundStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::gateway::PaymentGateway;
use crate::ports::store::{Filter, FilterOp, RecordStore};

const INTENTS: &str = "payment_intents";
const REFUNDS: &str = "refunds";

/// Input for `create_intent`.
#[derive(Debug, Clone)]
pub struct CreateIntent {
    pub amount: Amount,
    pub currency: String,
    pub payment_method_id: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Outcome of `confirm_intent`: the persisted intent plus whether the
/// gateway approved. The write succeeds either way; `approved`
/// mirrors the gateway verdict.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub intent: PaymentIntent,
    pub approved: bool,
}

/// Input for `process_refund`.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub payment_intent_id: Uuid,
    /// Defaults to the intent's full amount.
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Payment-intent lifecycle over the store and gateway ports.
pub struct PaymentIntents<S: RecordStore, G: PaymentGateway> {
    store: Arc<S>,
    gateway: Arc<G>,
    /// Service secret for client-secret derivation (never persisted).
    secret: String,
}

impl<S: RecordStore, G: PaymentGateway> PaymentIntents<S, G> {
    pub fn new(store: Arc<S>, gateway: Arc<G>, secret: String) -> Self {
        Self {
            store,
            gateway,
            secret,
        }
    }

    /// Persist a new intent in `requires_payment_method`.
    ///
    /// No gateway call happens here; the intent only reserves the
    /// amount-to-be-captured and hands the client its secret.
    #[instrument(skip(self, input), fields(amount = %input.amount))]
    pub async fn create_intent(&self, input: CreateIntent) -> CoreResult<PaymentIntent> {
        let mut intent = PaymentIntent::new(
            input.amount,
            &input.currency,
            input.payment_method_id,
            input.customer_id,
            input.description,
            input.metadata,
        );
        intent.client_secret = Some(self.derive_client_secret(&intent.id));

        let created = self
            .store
            .create(INTENTS, serde_json::to_value(&intent)?)
            .await?;
        let intent: PaymentIntent = serde_json::from_value(created)?;
        info!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    /// Confirm an intent through the gateway.
    ///
    /// Transitions to `succeeded` on approval, `canceled` on decline;
    /// the chosen payment method is persisted with the outcome.
    #[instrument(skip(self))]
    pub async fn confirm_intent(
        &self,
        intent_id: Uuid,
        payment_method_id: Option<String>,
    ) -> CoreResult<ConfirmOutcome> {
        let intent = self.require_intent(intent_id).await?;

        let approved = self.gateway.process_payment().await?;
        let status = if approved {
            IntentStatus::Succeeded
        } else {
            IntentStatus::Canceled
        };

        let method = payment_method_id.or(intent.payment_method_id);
        let updated = self
            .store
            .update(
                INTENTS,
                &[Filter::eq("id", intent_id.to_string())],
                json!({
                    "status": status,
                    "payment_method_id": method,
                    "updated_at": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        let intent: PaymentIntent = row_from_update(updated, "payment intent")?;

        info!(intent_id = %intent.id, status = %intent.status, approved, "Payment confirmed");
        Ok(ConfirmOutcome { intent, approved })
    }

    /// Cancel an intent if it is still cancelable.
    ///
    /// The update is conditioned on status, so a terminal intent is
    /// left untouched; the call then returns the unchanged intent
    /// (idempotent no-op) rather than failing.
    #[instrument(skip(self))]
    pub async fn cancel_intent(&self, intent_id: Uuid) -> CoreResult<PaymentIntent> {
        let updated = self
            .store
            .update(
                INTENTS,
                &[
                    Filter::eq("id", intent_id.to_string()),
                    Filter::new(
                        "status",
                        FilterOp::In,
                        json!(["requires_payment_method", "requires_confirmation"]),
                    ),
                ],
                json!({
                    "status": IntentStatus::Canceled,
                    "updated_at": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        if !updated.is_empty() {
            let intent: PaymentIntent = row_from_update(updated, "payment intent")?;
            info!(intent_id = %intent_id, "Payment intent canceled");
            return Ok(intent);
        }

        // Zero rows matched: missing id, or a non-cancelable status.
        let intent = self.require_intent(intent_id).await?;
        warn!(
            intent_id = %intent_id,
            status = %intent.status,
            "Cancel request ignored for non-cancelable intent"
        );
        Ok(intent)
    }

    /// Refund a succeeded intent.
    ///
    /// Creates a `pending` refund row, asks the gateway, then settles
    /// the row to `succeeded` or `failed`. A non-succeeded intent is
    /// rejected before any row is written.
    #[instrument(skip(self, request))]
    pub async fn process_refund(&self, request: RefundRequest) -> CoreResult<Refund> {
        let row = self
            .store
            .get_one(
                INTENTS,
                &[
                    Filter::eq("id", request.payment_intent_id.to_string()),
                    Filter::eq("status", "succeeded"),
                ],
            )
            .await?;
        let Some(row) = row else {
            return Err(CoreError::validation(
                "Intent de pago no encontrado o no válido para reembolso",
            ));
        };
        let intent: PaymentIntent = serde_json::from_value(row)?;

        let amount = request.amount.unwrap_or(intent.amount);
        let refund = Refund::pending(&intent, amount, request.reason);
        let created = self
            .store
            .create(REFUNDS, serde_json::to_value(&refund)?)
            .await?;
        let refund: Refund = serde_json::from_value(created)?;

        let accepted = self.gateway.process_refund().await?;
        let status = if accepted {
            RefundStatus::Succeeded
        } else {
            RefundStatus::Failed
        };

        let updated = self
            .store
            .update(
                REFUNDS,
                &[Filter::eq("id", refund.id.to_string())],
                json!({
                    "status": status,
                    "updated_at": chrono::Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        let refund: Refund = row_from_update(updated, "refund")?;

        info!(
            refund_id = %refund.id,
            intent_id = %intent.id,
            status = %refund.status,
            "Refund processed"
        );
        Ok(refund)
    }

    async fn require_intent(&self, intent_id: Uuid) -> CoreResult<PaymentIntent> {
        let row = self
            .store
            .get_one(INTENTS, &[Filter::eq("id", intent_id.to_string())])
            .await?
            .ok_or_else(|| CoreError::not_found("Payment intent not found"))?;
        Ok(serde_json::from_value(row)?)
    }

    /// `pi_<id>_secret_<base64(hmac-sha256(secret, id))>`.
    fn derive_client_secret(&self, intent_id: &Uuid) -> String {
        let mac = hmac_sha256::HMAC::mac(
            intent_id.to_string().as_bytes(),
            self.secret.as_bytes(),
        );
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(mac);
        format!("pi_{intent_id}_secret_{token}")
    }
}

fn row_from_update<T: serde::de::DeserializeOwned>(
    mut rows: Vec<serde_json::Value>,
    what: &str,
) -> CoreResult<T> {
    if rows.is_empty() {
        return Err(CoreError::not_found(format!(
            "No {what} matched the update"
        )));
    }
    Ok(serde_json::from_value(rows.swap_remove(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Gateway double with scripted outcomes.
    struct FixedGateway {
        approve_payment: bool,
        accept_refund: bool,
    }

    #[async_trait]
    impl PaymentGateway for FixedGateway {
        async fn process_payment(&self) -> CoreResult<bool> {
            Ok(self.approve_payment)
        }

        async fn process_refund(&self) -> CoreResult<bool> {
            Ok(self.accept_refund)
        }
    }

    fn manager(
        approve_payment: bool,
        accept_refund: bool,
    ) -> (Arc<MemoryStore>, PaymentIntents<MemoryStore, FixedGateway>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FixedGateway {
            approve_payment,
            accept_refund,
        });
        let manager = PaymentIntents::new(Arc::clone(&store), gateway, "test-secret".to_string());
        (store, manager)
    }

    fn create_input() -> CreateIntent {
        CreateIntent {
            amount: Amount::new(dec!(19.99)).unwrap(),
            currency: "USD".to_string(),
            payment_method_id: None,
            customer_id: Some("cus_1".to_string()),
            description: Some("booster box".to_string()),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_intent_has_secret_and_initial_status() {
        let (_, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        let secret = intent.client_secret.unwrap();
        assert!(secret.starts_with(&format!("pi_{}_secret_", intent.id)));
    }

    #[tokio::test]
    async fn test_client_secret_is_deterministic_per_intent() {
        let (_, manager) = manager(true, true);
        let id = Uuid::new_v4();
        assert_eq!(
            manager.derive_client_secret(&id),
            manager.derive_client_secret(&id)
        );
        assert_ne!(
            manager.derive_client_secret(&id),
            manager.derive_client_secret(&Uuid::new_v4())
        );
    }

    #[tokio::test]
    async fn test_confirm_approved_succeeds() {
        let (_, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        let outcome = manager
            .confirm_intent(intent.id, Some("pm_visa".to_string()))
            .await
            .unwrap();
        assert!(outcome.approved);
        assert_eq!(outcome.intent.status, IntentStatus::Succeeded);
        assert_eq!(outcome.intent.payment_method_id.as_deref(), Some("pm_visa"));
    }

    #[tokio::test]
    async fn test_confirm_declined_cancels() {
        let (_, manager) = manager(false, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        let outcome = manager.confirm_intent(intent.id, None).await.unwrap();
        assert!(!outcome.approved);
        assert_eq!(outcome.intent.status, IntentStatus::Canceled);
    }

    #[tokio::test]
    async fn test_confirm_missing_intent_not_found() {
        let (_, manager) = manager(true, true);
        let err = manager.confirm_intent(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_fresh_intent() {
        let (_, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        let canceled = manager.cancel_intent(intent.id).await.unwrap();
        assert_eq!(canceled.status, IntentStatus::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_terminal_intent_is_noop() {
        let (_, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        manager.confirm_intent(intent.id, None).await.unwrap();

        let unchanged = manager.cancel_intent(intent.id).await.unwrap();
        assert_eq!(unchanged.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_refund_defaults_to_full_amount() {
        let (_, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();
        manager.confirm_intent(intent.id, None).await.unwrap();

        let refund = manager
            .process_refund(RefundRequest {
                payment_intent_id: intent.id,
                amount: None,
                reason: Some("requested_by_customer".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(refund.amount, dec!(19.99));
        assert_eq!(refund.status, RefundStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_refund_gateway_decline_marks_failed() {
        let (_, manager) = manager(true, false);
        let intent = manager.create_intent(create_input()).await.unwrap();
        manager.confirm_intent(intent.id, None).await.unwrap();

        let refund = manager
            .process_refund(RefundRequest {
                payment_intent_id: intent.id,
                amount: Some(dec!(5.00)),
                reason: None,
            })
            .await
            .unwrap();
        assert_eq!(refund.status, RefundStatus::Failed);
        assert_eq!(refund.amount, dec!(5.00));
    }

    #[tokio::test]
    async fn test_refund_on_unconfirmed_intent_rejected_without_rows() {
        let (store, manager) = manager(true, true);
        let intent = manager.create_intent(create_input()).await.unwrap();

        let err = manager
            .process_refund(RefundRequest {
                payment_intent_id: intent.id,
                amount: None,
                reason: None,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Intent de pago no encontrado o no válido para reembolso"
        );
        assert!(store.dump("refunds").await.is_empty());
    }
}
