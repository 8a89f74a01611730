//! Simulated Gateway — Stand-in Payment Processor
//!
//! Models the external processor with configurable approval rates and
//! a fixed artificial latency, so the intent lifecycle behaves like it
//! would against a real gateway. The RNG is seedable: tests that need
//! scripted outcomes either pin the seed or inject a mock of the
//! `PaymentGateway` port instead.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::error::CoreResult;
use crate::ports::gateway::PaymentGateway;

/// Configuration for the simulated processor.
#[derive(Debug, Clone)]
pub struct SimulatedGatewayConfig {
    /// Probability a payment is approved.
    pub payment_success_rate: f64,
    /// Probability a refund is accepted.
    pub refund_success_rate: f64,
    /// Artificial processing delay per call (milliseconds).
    pub latency_ms: u64,
}

impl Default for SimulatedGatewayConfig {
    fn default() -> Self {
        Self {
            payment_success_rate: 0.95,
            refund_success_rate: 0.98,
            latency_ms: 150,
        }
    }
}

/// Simulated external payment processor.
pub struct SimulatedGateway {
    config: SimulatedGatewayConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedGateway {
    /// Create a gateway with OS-seeded randomness.
    pub fn new(config: SimulatedGatewayConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a gateway with a pinned seed (deterministic outcomes).
    pub fn with_seed(config: SimulatedGatewayConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    async fn simulate(&self, success_rate: f64) -> bool {
        sleep(Duration::from_millis(self.config.latency_ms)).await;
        let mut rng = self.rng.lock().await;
        rng.gen_bool(success_rate.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    #[instrument(skip(self))]
    async fn process_payment(&self) -> CoreResult<bool> {
        let approved = self.simulate(self.config.payment_success_rate).await;
        debug!(approved, "Simulated payment processed");
        Ok(approved)
    }

    #[instrument(skip(self))]
    async fn process_refund(&self) -> CoreResult<bool> {
        let accepted = self.simulate(self.config.refund_success_rate).await;
        debug!(accepted, "Simulated refund processed");
        Ok(accepted)
    }
}
