//! Ledger Benchmarks — Wallet Post Throughput
//!
//! Measures credit/debit posting and balance reads against the
//! in-memory store, which bounds the cost the core adds on top of
//! the network round trip.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;

use cardmarket_core::adapters::persistence::MemoryStore;
use cardmarket_core::domain::money::Amount;
use cardmarket_core::usecases::wallet_ledger::{PostOptions, WalletLedger};
use cardmarket_core::usecases::TransferCoordinator;

fn bench_credit_posts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("ledger_credit_post", |b| {
        b.to_async(&rt).iter_batched(
            || WalletLedger::new(Arc::new(MemoryStore::new())),
            |ledger| async move {
                ledger
                    .credit(
                        "bench-user",
                        Amount::new(dec!(10.00)).unwrap(),
                        "bench credit",
                        PostOptions::default(),
                    )
                    .await
                    .unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_balance_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let ledger = WalletLedger::new(Arc::new(MemoryStore::new()));
    rt.block_on(async {
        ledger
            .credit(
                "bench-user",
                Amount::new(dec!(1000.00)).unwrap(),
                "seed",
                PostOptions::default(),
            )
            .await
            .unwrap();
    });

    c.bench_function("ledger_balance_read", |b| {
        b.to_async(&rt).iter(|| {
            let ledger = ledger.clone();
            async move { ledger.get_balance("bench-user").await.unwrap() }
        });
    });
}

fn bench_transfer(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    // One deeply funded sender outlives every iteration.
    let ledger = WalletLedger::new(Arc::new(MemoryStore::new()));
    rt.block_on(async {
        ledger
            .credit(
                "alice",
                Amount::new(dec!(1000000000.00)).unwrap(),
                "seed",
                PostOptions::default(),
            )
            .await
            .unwrap();
    });
    let coordinator = Arc::new(TransferCoordinator::new(ledger));

    c.bench_function("ledger_transfer", |b| {
        b.to_async(&rt).iter(|| {
            let coordinator = Arc::clone(&coordinator);
            async move {
                coordinator
                    .transfer_funds(
                        "alice",
                        "bob",
                        Amount::new(dec!(1.00)).unwrap(),
                        "bench transfer",
                        PostOptions::default(),
                    )
                    .await
                    .unwrap()
            }
        });
    });
}

criterion_group!(benches, bench_credit_posts, bench_balance_read, bench_transfer);
criterion_main!(benches);
