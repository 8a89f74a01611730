//! Shared test fixtures: a fault-injecting store wrapper and seeding
//! helpers used across the integration suites.

// Each integration test crate compiles this module separately and
// uses a different subset of it.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use cardmarket_core::adapters::persistence::MemoryStore;
use cardmarket_core::error::{CoreError, CoreResult};
use cardmarket_core::ports::store::{Filter, Page, Query, RecordStore};

/// Delegating store that fails selected operations, for exercising
/// compensation paths deterministically.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Fail `wallet_post` when the entry's user_id matches.
    pub fail_post_for_user: Option<String>,
    /// Fail `create` on this table.
    pub fail_create_table: Option<String>,
}

impl FlakyStore {
    pub fn wrapping(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_many(&self, table: &str, query: &Query) -> CoreResult<Page> {
        self.inner.get_many(table, query).await
    }

    async fn get_one(&self, table: &str, filters: &[Filter]) -> CoreResult<Option<Value>> {
        self.inner.get_one(table, filters).await
    }

    async fn create(&self, table: &str, record: Value) -> CoreResult<Value> {
        if self.fail_create_table.as_deref() == Some(table) {
            return Err(CoreError::persistence(format!(
                "Injected create failure on {table}"
            )));
        }
        self.inner.create(table, record).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> CoreResult<Vec<Value>> {
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        self.inner.delete(table, filters).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> CoreResult<u64> {
        self.inner.count(table, filters).await
    }

    async fn rpc(&self, procedure: &str, params: Value) -> CoreResult<Value> {
        if procedure == "wallet_post" {
            let target = params
                .get("entry")
                .and_then(|e| e.get("user_id"))
                .and_then(Value::as_str);
            if target.is_some() && target == self.fail_post_for_user.as_deref() {
                return Err(CoreError::persistence("Injected wallet_post failure"));
            }
        }
        self.inner.rpc(procedure, params).await
    }
}

/// Seed the catalog rows the trade processor validates against.
pub async fn seed_marketplace(store: &Arc<impl RecordStoreSeed>) {
    store
        .seed_rows(
            "cards",
            vec![json!({"id": "card_blitz", "name": "Blitz Dragon", "price": "25.00"})],
        )
        .await;
    store
        .seed_rows(
            "collections",
            vec![json!({"user_id": "seller_1", "card_id": "card_blitz", "quantity": 3})],
        )
        .await;
    store
        .seed_rows(
            "profiles",
            vec![
                json!({"id": "buyer_1", "username": "buyer"}),
                json!({"id": "seller_1", "username": "seller"}),
            ],
        )
        .await;
}

/// Seeding shim so both `MemoryStore` and `FlakyStore` work with the
/// fixture helpers.
#[async_trait]
pub trait RecordStoreSeed: Send + Sync {
    async fn seed_rows(&self, table: &str, rows: Vec<Value>);
}

#[async_trait]
impl RecordStoreSeed for MemoryStore {
    async fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        self.seed(table, rows).await;
    }
}

#[async_trait]
impl RecordStoreSeed for FlakyStore {
    async fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        self.inner.seed(table, rows).await;
    }
}
