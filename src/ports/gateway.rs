//! Payment Gateway Port — External Processor Interface
//!
//! The payment-intent lifecycle depends on an external processor only
//! through this trait. The production adapter simulates the processor
//! (`adapters::gateway::simulated`); tests inject fixed or mocked
//! outcomes so intent transitions are deterministic.
//!
//! A declined payment/refund is a business outcome (`Ok(false)`),
//! not an error; `Err` means the gateway itself failed.

use async_trait::async_trait;

use crate::error::CoreResult;

/// Capability trait for the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Attempt to capture a payment. `Ok(true)` = approved.
    async fn process_payment(&self) -> CoreResult<bool>;

    /// Attempt to process a refund. `Ok(true)` = accepted.
    async fn process_refund(&self) -> CoreResult<bool>;
}
