//! REST Store — Hosted Data Platform Client
//!
//! Implements the `RecordStore` port against the platform's
//! PostgREST-style API: `/rest/v1/{table}` for rows and
//! `/rest/v1/rpc/{name}` for procedures. Filters serialize to the
//! platform's operator syntax (`status=eq.completed`,
//! `status=not.in.("succeeded","canceled")`, `name=ilike.*lotus*`).
//!
//! Requests are rate-limited by a semaphore and retried with
//! exponential backoff on 429/5xx/transport failures. Store-side
//! `insufficient_funds` exceptions from `wallet_post` are mapped back
//! to `CoreError::InsufficientFunds`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::ports::store::{Filter, FilterOp, Page, Query, RecordStore, SortDirection};

/// Configuration for the hosted-platform client.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Platform base URL (without the `/rest/v1` suffix).
    pub base_url: String,
    /// Project API key, sent as `apikey` and bearer token.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
    /// Maximum retries on transient errors.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            max_concurrent: 10,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

/// Record store over the hosted platform's REST API.
pub struct RestStore {
    http: Client,
    config: RestStoreConfig,
    semaphore: Arc<Semaphore>,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> CoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| CoreError::persistence(format!("Failed to build HTTP client: {e}")))?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            http,
            config,
            semaphore,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// Execute with bounded concurrency and retries on transient errors.
    async fn execute_with_retry(&self, request: RequestBuilder) -> CoreResult<Response> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CoreError::persistence("Request semaphore closed"))?;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying request");
                sleep(delay).await;
            }

            let Some(req) = request.try_clone() else {
                return Err(CoreError::persistence("Failed to clone request"));
            };

            match self.authed(req).send().await {
                Ok(response) => match response.status() {
                    status if status.is_success() => return Ok(response),
                    StatusCode::TOO_MANY_REQUESTS => {
                        warn!("Rate limited by platform, backing off");
                        last_error = Some(CoreError::persistence("Rate limited"));
                        continue;
                    }
                    status if status.is_server_error() => {
                        warn!(status = %status, "Server error, retrying");
                        last_error = Some(CoreError::persistence(format!("Server error: {status}")));
                        continue;
                    }
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        return Err(classify_api_error(status, &body));
                    }
                },
                Err(e) => {
                    warn!(error = %e, attempt, "Request failed");
                    last_error = Some(CoreError::persistence(format!("Request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::persistence("Max retries exceeded")))
    }

    async fn json_rows(&self, response: Response) -> CoreResult<Vec<Value>> {
        let body: Value = response
            .json()
            .await
            .map_err(|e| CoreError::persistence(format!("Invalid JSON response: {e}")))?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }
}

/// Serialize filters to PostgREST query parameters.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let op = f.op.as_str();
            let rendered = render_value(&f.op, &f.value);
            let rhs = if f.negated {
                format!("not.{op}.{rendered}")
            } else {
                format!("{op}.{rendered}")
            };
            (f.column.clone(), rhs)
        })
        .collect()
}

/// Render a filter value in the platform's operand syntax.
fn render_value(op: &FilterOp, value: &Value) -> String {
    match op {
        FilterOp::In => {
            let items = value
                .as_array()
                .map(|set| {
                    set.iter()
                        .map(render_scalar)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            format!("({items})")
        }
        // The platform uses `*` as the like wildcard in URLs.
        FilterOp::Like | FilterOp::Ilike => value
            .as_str()
            .map(|s| s.replace('%', "*"))
            .unwrap_or_default(),
        _ => match value {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        },
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

/// Total row count from a `Content-Range: 0-9/42` header.
fn content_range_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|total| total.parse().ok())
}

/// Map a non-retryable API error body onto the core taxonomy.
///
/// The `wallet_post` database function raises `insufficient_funds`
/// with a JSON detail carrying the observed balance and amount; that
/// convention is re-materialized as `CoreError::InsufficientFunds`.
fn classify_api_error(status: StatusCode, body: &str) -> CoreError {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        let message = parsed.get("message").and_then(Value::as_str).unwrap_or("");
        if message.contains("insufficient_funds") {
            let detail = parsed
                .get("details")
                .and_then(Value::as_str)
                .and_then(|d| serde_json::from_str::<Value>(d).ok());
            if let Some(detail) = detail {
                let balance = decimal_detail(&detail, "balance");
                let amount = decimal_detail(&detail, "amount");
                if let (Some(balance), Some(amount)) = (balance, amount) {
                    return CoreError::InsufficientFunds { balance, amount };
                }
            }
            return CoreError::InsufficientFunds {
                balance: Decimal::ZERO,
                amount: Decimal::ZERO,
            };
        }
    }
    CoreError::persistence(format!("API error {status}: {body}"))
}

fn decimal_detail(detail: &Value, field: &str) -> Option<Decimal> {
    detail
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
}

#[async_trait]
impl RecordStore for RestStore {
    async fn get_many(&self, table: &str, query: &Query) -> CoreResult<Page> {
        let mut params = filter_params(&query.filters);
        if let Some(order) = &query.order_by {
            let dir = match order.direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }

        let request = self
            .http
            .get(self.table_url(table))
            .query(&params)
            .header("Prefer", "count=exact");
        let response = self.execute_with_retry(request).await?;
        let total = content_range_total(&response).unwrap_or(0);
        let rows = self.json_rows(response).await?;
        let total = total.max(rows.len() as u64);
        Ok(Page { rows, total })
    }

    async fn get_one(&self, table: &str, filters: &[Filter]) -> CoreResult<Option<Value>> {
        let mut params = filter_params(filters);
        params.push(("limit".to_string(), "1".to_string()));
        let request = self.http.get(self.table_url(table)).query(&params);
        let response = self.execute_with_retry(request).await?;
        let mut rows = self.json_rows(response).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn create(&self, table: &str, record: Value) -> CoreResult<Value> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&record);
        let response = self.execute_with_retry(request).await?;
        let mut rows = self.json_rows(response).await?;
        if rows.is_empty() {
            return Err(CoreError::persistence("Create returned no row"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> CoreResult<Vec<Value>> {
        let params = filter_params(filters);
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.execute_with_retry(request).await?;
        self.json_rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        let params = filter_params(filters);
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&params)
            .header("Prefer", "return=representation");
        let response = self.execute_with_retry(request).await?;
        let rows = self.json_rows(response).await?;
        Ok(rows.len() as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        let mut params = filter_params(filters);
        params.push(("select".to_string(), "id".to_string()));
        let request = self
            .http
            .get(self.table_url(table))
            .query(&params)
            .header("Prefer", "count=exact")
            .header("Range", "0-0");
        let response = self.execute_with_retry(request).await?;
        content_range_total(&response)
            .ok_or_else(|| CoreError::persistence("Count response missing Content-Range"))
    }

    async fn rpc(&self, procedure: &str, params: Value) -> CoreResult<Value> {
        let url = format!("{}/rest/v1/rpc/{procedure}", self.config.base_url);
        let request = self.http.post(url).json(&params);
        let response = self.execute_with_retry(request).await?;
        response
            .json()
            .await
            .map_err(|e| CoreError::persistence(format!("Invalid RPC response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_params_render_operators() {
        let params = filter_params(&[
            Filter::eq("status", "completed"),
            Filter::new("total", FilterOp::Gte, "50.00"),
            Filter::new("name", FilterOp::Ilike, "%lotus%"),
        ]);
        assert_eq!(params[0], ("status".to_string(), "eq.completed".to_string()));
        assert_eq!(params[1], ("total".to_string(), "gte.50.00".to_string()));
        assert_eq!(params[2], ("name".to_string(), "ilike.*lotus*".to_string()));
    }

    #[test]
    fn test_negated_in_filter_renders_not_prefix() {
        let params = filter_params(&[Filter::new(
            "status",
            FilterOp::In,
            json!(["succeeded", "canceled"]),
        )
        .negate()]);
        assert_eq!(
            params[0],
            (
                "status".to_string(),
                "not.in.(\"succeeded\",\"canceled\")".to_string()
            )
        );
    }

    #[test]
    fn test_is_null_renders_literal() {
        let params = filter_params(&[Filter::new("reference_id", FilterOp::Is, Value::Null)]);
        assert_eq!(
            params[0],
            ("reference_id".to_string(), "is.null".to_string())
        );
    }

    #[test]
    fn test_classify_insufficient_funds_error() {
        let body = json!({
            "message": "insufficient_funds",
            "details": "{\"balance\": \"10.00\", \"amount\": \"25.00\"}",
        })
        .to_string();
        let err = classify_api_error(StatusCode::BAD_REQUEST, &body);
        match err {
            CoreError::InsufficientFunds { balance, amount } => {
                assert_eq!(balance.to_string(), "10.00");
                assert_eq!(amount.to_string(), "25.00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_classify_other_error_is_persistence() {
        let err = classify_api_error(StatusCode::BAD_REQUEST, "{\"message\": \"nope\"}");
        assert!(matches!(err, CoreError::Persistence(_)));
    }
}
