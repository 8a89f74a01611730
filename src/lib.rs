//! Cardmarket Core — Library Root
//!
//! Value-transfer core of the collectible-card marketplace: wallet
//! ledger, fund transfers, payment-intent lifecycle and the trade
//! processor, all over a generic persistence port.
//! Re-exports all modules for integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod usecases;

pub use error::{CoreError, CoreResult};
