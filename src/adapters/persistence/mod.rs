//! Persistence Adapters - Record Store Implementations
//!
//! Implements the `RecordStore` port twice: against the hosted data
//! platform's REST API for production, and over an in-memory table
//! map for tests, benches and local development.

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::{RestStore, RestStoreConfig};
