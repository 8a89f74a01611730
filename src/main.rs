//! Cardmarket Core — Entry Point
//!
//! Initializes configuration, logging, the hosted-platform store, the
//! simulated gateway and the recovery sweep loop. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load service secret from env (CARDMARKET_SECRET_KEY)
//! 4. Create RestStore (HTTP + retry + bounded concurrency)
//! 5. Create SimulatedGateway + metrics registry
//! 6. Construct ledger, transfer, payments, trade, sweeper use cases
//! 7. Spawn health server (/live + /ready) and metrics server
//! 8. Spawn periodic recovery sweep loop
//! 9. Wait for SIGINT → graceful shutdown (drain→final sweep→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use cardmarket_core::adapters::gateway::{SimulatedGateway, SimulatedGatewayConfig};
use cardmarket_core::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use cardmarket_core::adapters::persistence::{RestStore, RestStoreConfig};
use cardmarket_core::config::{self, AppConfig};
use cardmarket_core::usecases::recovery::RecoverySweeper;
use cardmarket_core::usecases::{
    PaymentIntents, TradeProcessor, TransferCoordinator, WalletLedger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        currency = %config.ledger.currency,
        "Starting cardmarket core"
    );

    // ── 3. Shutdown signal channel + health state ───────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health_state = Arc::new(HealthState::new());

    // ── 4. Load the client-secret key from env ──────────────
    let secret = std::env::var("CARDMARKET_SECRET_KEY")
        .context("CARDMARKET_SECRET_KEY not set")?;

    // ── 5. Create the hosted-platform record store ──────────
    let store = Arc::new(
        RestStore::new(RestStoreConfig {
            base_url: config.api.base_url.clone(),
            api_key: config.api.api_key.clone(),
            timeout: Duration::from_millis(config.api.timeout_ms),
            max_concurrent: config.api.max_concurrent,
            max_retries: config.api.max_retries,
            retry_base_delay: Duration::from_millis(200),
        })
        .context("Failed to create record store")?,
    );

    // ── 6. Create the simulated payment gateway ─────────────
    let gateway = Arc::new(SimulatedGateway::new(SimulatedGatewayConfig {
        payment_success_rate: config.gateway.payment_success_rate,
        refund_success_rate: config.gateway.refund_success_rate,
        latency_ms: config.gateway.latency_ms,
    }));

    // ── 7. Wire the use cases ───────────────────────────────
    let ledger = WalletLedger::with_currency(Arc::clone(&store), &config.ledger.currency);
    let _transfers = TransferCoordinator::new(ledger.clone());
    let _payments = PaymentIntents::new(Arc::clone(&store), Arc::clone(&gateway), secret);
    let _trades = TradeProcessor::new(Arc::clone(&store), ledger.clone());
    let sweeper = Arc::new(RecoverySweeper::new(
        Arc::clone(&store),
        config.recovery.grace_seconds,
    ));

    // ── 8. Spawn health + metrics servers ───────────────────
    let health_handle = tokio::spawn(
        HealthServer::new(Arc::clone(&health_state), config.metrics.health_port)
            .run(shutdown_tx.subscribe()),
    );

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let metrics_handle = if config.metrics.enabled {
        Some(tokio::spawn(Arc::clone(&metrics).serve(
            config.metrics.bind_address.clone(),
            shutdown_tx.subscribe(),
        )))
    } else {
        None
    };

    // ── 9. Spawn the recovery sweep loop ────────────────────
    let sweep_handle = if config.recovery.enabled {
        Some(tokio::spawn(run_sweep_loop(
            config.clone(),
            Arc::clone(&sweeper),
            Arc::clone(&metrics),
            shutdown_tx.subscribe(),
        )))
    } else {
        warn!("Recovery sweep disabled — orphaned partial states will persist");
        None
    };

    info!("All tasks spawned — service is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown (drain → final sweep → exit) ──────

    // 1. Readiness probe → 503, stop taking new work
    health_state.begin_shutdown();

    // 2. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 3. One final sweep so known orphans don't wait for restart
    if config.recovery.enabled {
        match sweeper.sweep().await {
            Ok(report) => info!(
                voided = report.sales_voided.len(),
                refunds_failed = report.refunds_failed.len(),
                "Final recovery sweep complete"
            ),
            Err(e) => warn!(error = %e, "Final recovery sweep failed"),
        }
    }

    // 4. Drain background tasks (bounded waits)
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    }
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

    info!("Shutdown complete");
    Ok(())
}

/// Periodic recovery sweep: voids orphaned sales and fails stale
/// pending refunds until shutdown.
async fn run_sweep_loop(
    config: AppConfig,
    sweeper: Arc<RecoverySweeper<RestStore>>,
    metrics: Arc<MetricsRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let interval = Duration::from_secs(config.recovery.interval_seconds);
    info!(
        interval_seconds = config.recovery.interval_seconds,
        grace_seconds = config.recovery.grace_seconds,
        "Recovery sweep loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Sweep loop received shutdown signal");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                metrics.sweep_running.set(1.0);
                match sweeper.sweep().await {
                    Ok(report) => {
                        metrics
                            .sweep_repairs
                            .with_label_values(&["sales"])
                            .inc_by(report.sales_voided.len() as u64);
                        metrics
                            .sweep_repairs
                            .with_label_values(&["refunds"])
                            .inc_by(report.refunds_failed.len() as u64);
                        if !report.is_clean() {
                            warn!(
                                voided = report.sales_voided.len(),
                                refunds_failed = report.refunds_failed.len(),
                                "Recovery sweep repaired orphaned state"
                            );
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Recovery sweep failed");
                    }
                }
                metrics.sweep_running.set(0.0);
            }
        }
    }

    info!("Sweep loop stopped cleanly");
}
