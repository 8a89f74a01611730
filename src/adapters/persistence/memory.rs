//! Memory Store — In-Process Record Store
//!
//! Implements the `RecordStore` port over a tokio-RwLock table map.
//! Used by tests, benches and local development. Filter semantics
//! match the REST adapter: ordered AND conjunction, numeric ordering
//! when both operands parse as decimals, `%` wildcards for like/ilike.
//!
//! The `wallet_post` procedure runs under a single write lock, which
//! gives it the same atomicity the hosted platform provides through a
//! store-side function: idempotency check, overdraft check, ledger
//! append and balance update cannot interleave with another post.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::ports::store::{Filter, FilterOp, Page, Query, RecordStore, SortDirection};

/// In-memory record store keyed by table name.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows (test/dev helper).
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot a table's rows (test/dev helper).
    pub async fn dump(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().unwrap_or_default()
    }

    /// The `wallet_post` procedure: atomically record a ledger entry
    /// and apply its balance delta.
    ///
    /// Params: `{ entry: WalletEntry-row, require_funds: bool }`.
    /// Returns `{ transaction, balance }`. An idempotency-key hit
    /// returns the previously stored entry and the current balance
    /// without applying anything twice.
    async fn wallet_post(&self, params: Value) -> CoreResult<Value> {
        let entry = params
            .get("entry")
            .cloned()
            .ok_or_else(|| CoreError::persistence("wallet_post: missing entry"))?;
        let require_funds = params
            .get("require_funds")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let user_id = str_field(&entry, "user_id")?;
        let currency = str_field(&entry, "currency")?;
        let amount = decimal_field(&entry, "amount")?;
        let idempotency_key = entry.get("idempotency_key").and_then(Value::as_str);
        let is_debit = str_field(&entry, "kind")? == "debit";

        let mut tables = self.tables.write().await;

        // Idempotent replay: return the original entry untouched.
        if let Some(key) = idempotency_key {
            let existing = tables.get("wallet_transactions").and_then(|log| {
                log.iter()
                    .find(|row| row.get("idempotency_key").and_then(Value::as_str) == Some(key))
                    .cloned()
            });
            if let Some(existing) = existing {
                let balance = wallet_balance(&tables, &user_id, &currency);
                debug!(key, "wallet_post idempotency hit");
                return Ok(json!({ "transaction": existing, "balance": balance.to_string() }));
            }
        }

        let balance = wallet_balance(&tables, &user_id, &currency);
        if is_debit && require_funds && balance < amount {
            return Err(CoreError::InsufficientFunds { balance, amount });
        }

        let new_balance = if is_debit { balance - amount } else { balance + amount };

        let wallets = tables.entry("wallets".to_string()).or_default();
        let now = Utc::now().to_rfc3339();
        match wallets.iter_mut().find(|w| {
            w.get("user_id").and_then(Value::as_str) == Some(user_id.as_str())
                && w.get("currency").and_then(Value::as_str) == Some(currency.as_str())
        }) {
            Some(wallet) => {
                wallet["balance"] = json!(new_balance.to_string());
                wallet["last_updated"] = json!(now);
            }
            None => wallets.push(json!({
                "user_id": user_id,
                "currency": currency,
                "balance": new_balance.to_string(),
                "last_updated": now,
            })),
        }

        tables
            .entry("wallet_transactions".to_string())
            .or_default()
            .push(entry.clone());

        Ok(json!({ "transaction": entry, "balance": new_balance.to_string() }))
    }
}

fn str_field(row: &Value, field: &str) -> CoreResult<String> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoreError::persistence(format!("wallet_post: missing {field}")))
}

fn decimal_field(row: &Value, field: &str) -> CoreResult<Decimal> {
    let raw = row
        .get(field)
        .ok_or_else(|| CoreError::persistence(format!("wallet_post: missing {field}")))?;
    as_decimal(raw)
        .ok_or_else(|| CoreError::persistence(format!("wallet_post: non-decimal {field}")))
}

fn wallet_balance(tables: &HashMap<String, Vec<Value>>, user_id: &str, currency: &str) -> Decimal {
    tables
        .get("wallets")
        .and_then(|rows| {
            rows.iter().find(|w| {
                w.get("user_id").and_then(Value::as_str) == Some(user_id)
                    && w.get("currency").and_then(Value::as_str) == Some(currency)
            })
        })
        .and_then(|w| w.get("balance"))
        .and_then(as_decimal)
        .unwrap_or(Decimal::ZERO)
}

/// Decimal view of a JSON value, accepting both numbers and
/// decimal-formatted strings (amounts are stored as strings).
fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Evaluate one predicate against a row.
fn matches_filter(row: &Value, filter: &Filter) -> bool {
    let field = row.get(&filter.column).unwrap_or(&Value::Null);
    let hit = match filter.op {
        FilterOp::Eq => loose_eq(field, &filter.value),
        FilterOp::Neq => !loose_eq(field, &filter.value),
        FilterOp::Gt => compare(field, &filter.value).is_some_and(|o| o == std::cmp::Ordering::Greater),
        FilterOp::Gte => compare(field, &filter.value).is_some_and(|o| o != std::cmp::Ordering::Less),
        FilterOp::Lt => compare(field, &filter.value).is_some_and(|o| o == std::cmp::Ordering::Less),
        FilterOp::Lte => compare(field, &filter.value).is_some_and(|o| o != std::cmp::Ordering::Greater),
        FilterOp::Like => like_match(field, &filter.value, false),
        FilterOp::Ilike => like_match(field, &filter.value, true),
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|set| set.iter().any(|v| loose_eq(field, v))),
        FilterOp::Is => field == &filter.value,
    };
    hit != filter.negated
}

/// Equality with numeric coercion so `"50.00"` matches `50.0`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_decimal(a), as_decimal(b)) {
        (Some(da), Some(db)) => da == db,
        _ => false,
    }
}

/// Ordering comparison: numeric when both sides parse as decimals,
/// lexical for strings (RFC 3339 timestamps order correctly this way).
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(da), Some(db)) = (as_decimal(a), as_decimal(b)) {
        return Some(da.cmp(&db));
    }
    match (a, b) {
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        _ => None,
    }
}

/// SQL LIKE with `%` wildcards (prefix/suffix/contains/exact).
fn like_match(field: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(mut text), Some(mut pat)) = (
        field.as_str().map(str::to_string),
        pattern.as_str().map(str::to_string),
    ) else {
        return false;
    };
    if case_insensitive {
        text = text.to_lowercase();
        pat = pat.to_lowercase();
    }
    match (pat.starts_with('%'), pat.ends_with('%')) {
        (true, true) => text.contains(pat.trim_matches('%')),
        (true, false) => text.ends_with(pat.trim_start_matches('%')),
        (false, true) => text.starts_with(pat.trim_end_matches('%')),
        (false, false) => text == pat,
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches_filter(row, f))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_many(&self, table: &str, query: &Query) -> CoreResult<Page> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            rows.sort_by(|a, b| {
                let fa = a.get(&order.column).unwrap_or(&Value::Null);
                let fb = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare(fa, fb).unwrap_or(std::cmp::Ordering::Equal);
                match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        let total = rows.len() as u64;
        let offset = query.offset.unwrap_or(0) as usize;
        let rows: Vec<Value> = rows
            .into_iter()
            .skip(offset)
            .take(query.limit.map_or(usize::MAX, |l| l as usize))
            .collect();

        Ok(Page { rows, total })
    }

    async fn get_one(&self, table: &str, filters: &[Filter]) -> CoreResult<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| matches_all(r, filters)))
            .cloned())
    }

    async fn create(&self, table: &str, record: Value) -> CoreResult<Value> {
        if !record.is_object() {
            return Err(CoreError::persistence("create: record must be an object"));
        }
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> CoreResult<Vec<Value>> {
        let Some(patch_map) = patch.as_object().cloned() else {
            return Err(CoreError::persistence("update: patch must be an object"));
        };
        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, filters)) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in &patch_map {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !matches_all(r, filters));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, filters)).count() as u64)
            .unwrap_or(0))
    }

    async fn rpc(&self, procedure: &str, params: Value) -> CoreResult<Value> {
        match procedure {
            "wallet_post" => self.wallet_post(params).await,
            other => Err(CoreError::persistence(format!(
                "Unknown procedure: {other}"
            ))),
        }
    }
}
