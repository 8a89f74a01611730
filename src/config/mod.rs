//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. All gateway
//! rates, platform endpoints and sweep cadences are externalized
//! here - nothing is hardcoded in the domain layer. The service
//! secret is NOT part of the file; it comes from the
//! `CARDMARKET_SECRET_KEY` environment variable.

pub mod loader;

use serde::Deserialize;

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the service begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Wallet ledger parameters.
  pub ledger: LedgerConfig,
  /// Simulated payment gateway parameters.
  pub gateway: GatewayConfig,
  /// Hosted data platform endpoints.
  pub api: ApiConfig,
  /// Recovery sweep cadence.
  pub recovery: RecoveryConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Wallet ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
  /// Settlement currency for lazily created wallets.
  #[serde(default = "default_currency")]
  pub currency: String,
}

/// Simulated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  /// Probability a payment confirmation is approved.
  #[serde(default = "default_payment_success_rate")]
  pub payment_success_rate: f64,
  /// Probability a refund is accepted.
  #[serde(default = "default_refund_success_rate")]
  pub refund_success_rate: f64,
  /// Artificial processing delay per gateway call (milliseconds).
  #[serde(default = "default_gateway_latency")]
  pub latency_ms: u64,
}

/// Hosted data platform configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Platform base URL (without the /rest/v1 suffix).
  pub base_url: String,
  /// Project API key.
  pub api_key: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Maximum retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Maximum concurrent platform requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
}

/// Recovery sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
  /// Enable the periodic sweep.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Seconds between sweep passes.
  #[serde(default = "default_sweep_interval")]
  pub interval_seconds: u64,
  /// Minimum age before a partial state counts as orphaned.
  #[serde(default = "default_grace")]
  pub grace_seconds: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_currency() -> String {
  "USD".to_string()
}

fn default_true() -> bool {
  true
}

fn default_payment_success_rate() -> f64 {
  0.95
}

fn default_refund_success_rate() -> f64 {
  0.98
}

fn default_gateway_latency() -> u64 {
  150
}

fn default_timeout_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_max_concurrent() -> usize {
  10
}

fn default_sweep_interval() -> u64 {
  60
}

fn default_grace() -> u64 {
  300
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
