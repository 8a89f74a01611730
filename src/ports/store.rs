//! Record Store Port — Generic Persistence Interface
//!
//! The whole core talks to its hosted data platform through this one
//! trait: typed tables of JSON rows, a small filter DSL, and an RPC
//! escape hatch for store-side procedures. Adapters map it onto the
//! platform's REST surface (`adapters::persistence::rest`) or onto an
//! in-memory table map for tests (`adapters::persistence::memory`).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreResult;

/// Comparison predicates supported by the filter DSL.
///
/// Mirrors the hosted platform's operator set. `In` expects an array
/// value; `Is` compares against null/true/false. Any predicate can be
/// negated via [`Filter::negate`], the platform's `not.` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
}

impl FilterOp {
    /// Wire name of the operator on the REST surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::In => "in",
            Self::Is => "is",
        }
    }
}

/// One predicate of an ordered AND conjunction.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
    /// Negates the predicate (`not.eq`, `not.in`, ...).
    pub negated: bool,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.into(),
            negated: false,
        }
    }

    /// Shorthand for the ubiquitous equality predicate.
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Negate this predicate.
    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }
}

/// Sort direction for `Query::order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering clause.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// Read query: filters + ordering + pagination window.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn filtered(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }
}

/// Paginated result of `get_many`.
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Value>,
    /// Total matching rows ignoring the pagination window.
    pub total: u64,
}

/// Generic record store over the hosted data platform.
///
/// Every method is one network round trip; the store offers no
/// multi-call transactions. Multi-row invariants therefore go through
/// `rpc` procedures (e.g. `wallet_post`) that the platform executes
/// atomically on its side.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Fetch rows matching `query`, with total count.
    async fn get_many(&self, table: &str, query: &Query) -> CoreResult<Page>;

    /// Fetch the first row matching `filters`, if any.
    async fn get_one(&self, table: &str, filters: &[Filter]) -> CoreResult<Option<Value>>;

    /// Insert a row and return it as stored.
    async fn create(&self, table: &str, record: Value) -> CoreResult<Value>;

    /// Patch all rows matching `filters`; returns the updated rows.
    ///
    /// Zero updated rows is not an error — callers that need the
    /// distinction check the returned length.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value)
        -> CoreResult<Vec<Value>>;

    /// Delete rows matching `filters`; returns the number removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> CoreResult<u64>;

    /// Count rows matching `filters`.
    async fn count(&self, table: &str, filters: &[Filter]) -> CoreResult<u64>;

    /// Invoke a store-side procedure.
    async fn rpc(&self, procedure: &str, params: Value) -> CoreResult<Value>;
}
