//! Prometheus Metrics Registry - Marketplace Observability
//!
//! Registers and exposes Prometheus metrics for dashboards over the
//! wallet ledger, payment lifecycle and trade processor. All metrics
//! follow the naming convention `cardmarket_core_*`.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Centralized Prometheus metrics for the marketplace core.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Ledger entries posted, by kind (credit/debit).
    pub ledger_posts: IntCounterVec,
    /// Transfers by outcome (completed/compensated/rejected).
    pub transfers: IntCounterVec,
    /// Payment confirmations by outcome (succeeded/canceled).
    pub confirmations: IntCounterVec,
    /// Refunds by outcome (succeeded/failed/rejected).
    pub refunds: IntCounterVec,
    /// Trades by outcome (recorded/rejected/compensated).
    pub trades: IntCounterVec,
    /// Rows repaired by the recovery sweep, by table.
    pub sweep_repairs: IntCounterVec,
    /// Ledger post latency (milliseconds).
    pub post_latency_ms: HistogramVec,
    /// Whether a recovery sweep is currently running (1 = yes).
    pub sweep_running: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ledger_posts = IntCounterVec::new(
            Opts::new("cardmarket_core_ledger_posts_total", "Ledger entries posted"),
            &["kind"],
        )?;

        let transfers = IntCounterVec::new(
            Opts::new("cardmarket_core_transfers_total", "Fund transfers"),
            &["outcome"],
        )?;

        let confirmations = IntCounterVec::new(
            Opts::new(
                "cardmarket_core_confirmations_total",
                "Payment intent confirmations",
            ),
            &["outcome"],
        )?;

        let refunds = IntCounterVec::new(
            Opts::new("cardmarket_core_refunds_total", "Refunds processed"),
            &["outcome"],
        )?;

        let trades = IntCounterVec::new(
            Opts::new("cardmarket_core_trades_total", "Card trades"),
            &["outcome"],
        )?;

        let sweep_repairs = IntCounterVec::new(
            Opts::new(
                "cardmarket_core_sweep_repairs_total",
                "Rows repaired by the recovery sweep",
            ),
            &["table"],
        )?;

        let post_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "cardmarket_core_post_latency_ms",
                "Ledger post latency in milliseconds",
            )
            .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]),
            &["kind"],
        )?;

        let sweep_running = Gauge::new(
            "cardmarket_core_sweep_running",
            "Whether a recovery sweep is running (1=yes, 0=no)",
        )?;

        // Register all metrics
        registry.register(Box::new(ledger_posts.clone()))?;
        registry.register(Box::new(transfers.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(refunds.clone()))?;
        registry.register(Box::new(trades.clone()))?;
        registry.register(Box::new(sweep_repairs.clone()))?;
        registry.register(Box::new(post_latency_ms.clone()))?;
        registry.register(Box::new(sweep_running.clone()))?;

        Ok(Self {
            registry,
            ledger_posts,
            transfers,
            confirmations,
            refunds,
            trades,
            sweep_repairs,
            post_latency_ms,
            sweep_running,
        })
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = metrics_self.registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    if encoder.encode(&metric_families, &mut buffer).is_err() {
                        return String::new();
                    }
                    String::from_utf8(buffer).unwrap_or_default()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
