//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    service = %config.service.name,
    currency = %config.ledger.currency,
    payment_rate = config.gateway.payment_success_rate,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Probability ranges (0..=1) on gateway rates
/// - Non-empty platform endpoints and currency
/// - Sensible sweep cadence
fn validate_config(config: &AppConfig) -> Result<()> {
  // Service validation
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "Service name must not be empty"
  );

  // Ledger validation
  anyhow::ensure!(
    !config.ledger.currency.is_empty(),
    "Ledger currency must not be empty"
  );
  anyhow::ensure!(
    config.ledger.currency.chars().all(|c| c.is_ascii_uppercase()),
    "Ledger currency must be an uppercase ISO code, got {}",
    config.ledger.currency
  );

  // Gateway validation
  anyhow::ensure!(
    (0.0..=1.0).contains(&config.gateway.payment_success_rate),
    "Gateway payment_success_rate must be in [0, 1], got {}",
    config.gateway.payment_success_rate
  );
  anyhow::ensure!(
    (0.0..=1.0).contains(&config.gateway.refund_success_rate),
    "Gateway refund_success_rate must be in [0, 1], got {}",
    config.gateway.refund_success_rate
  );

  // API validation
  anyhow::ensure!(
    !config.api.base_url.is_empty(),
    "Platform base URL must not be empty"
  );
  anyhow::ensure!(
    !config.api.api_key.is_empty(),
    "Platform API key must not be empty"
  );
  anyhow::ensure!(
    config.api.timeout_ms > 0,
    "Platform timeout_ms must be positive"
  );

  // Recovery validation
  anyhow::ensure!(
    config.recovery.interval_seconds > 0,
    "Recovery interval_seconds must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base_toml() -> String {
    r#"
      [service]
      name = "cardmarket-core"

      [ledger]

      [gateway]

      [api]
      base_url = "https://project.example.co"
      api_key = "anon-key"

      [recovery]

      [metrics]
    "#
    .to_string()
  }

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_parses_with_defaults() {
    let config: AppConfig = toml::from_str(&base_toml()).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.ledger.currency, "USD");
    assert_eq!(config.gateway.payment_success_rate, 0.95);
    assert_eq!(config.gateway.refund_success_rate, 0.98);
    assert_eq!(config.recovery.grace_seconds, 300);
  }

  #[test]
  fn test_out_of_range_gateway_rate_rejected() {
    let toml = base_toml().replace(
      "[gateway]",
      "[gateway]\npayment_success_rate = 1.5",
    );
    let config: AppConfig = toml::from_str(&toml).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_lowercase_currency_rejected() {
    let toml = base_toml().replace("[ledger]", "[ledger]\ncurrency = \"usd\"");
    let config: AppConfig = toml::from_str(&toml).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_empty_api_key_rejected() {
    let toml = base_toml().replace("api_key = \"anon-key\"", "api_key = \"\"");
    let config: AppConfig = toml::from_str(&toml).unwrap();
    assert!(validate_config(&config).is_err());
  }
}
