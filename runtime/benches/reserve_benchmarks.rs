//! Reservation throughput benchmarks over the in-memory store.
//!
//! Measures protocol overhead (retry loop, metrics, lock bookkeeping) without a
//! database in the way.
//!
//! Run with: `cargo bench -p seatlock-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use seatlock_core::TheatreId;
use seatlock_runtime::{RetryPolicy, SeatReserver};
use seatlock_testing::{InMemorySeatPool, helpers};
use std::sync::Arc;
use std::time::Duration;

fn policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(2)
        .backoff_unit(Duration::from_micros(10))
        .build()
}

/// Benchmark a single uncontended reservation
fn benchmark_single_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_reservation");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("reserve_first_free_seat", |b| {
        let user = helpers::user(1);
        let theatre = TheatreId::new(1);

        b.to_async(&runtime).iter(|| async {
            let pool = Arc::new(InMemorySeatPool::new());
            pool.provision_theatre(theatre, 1, 1);
            let reserver = SeatReserver::new(pool, policy());
            let _ = reserver.reserve(black_box(&user), theatre).await;
        });
    });

    group.finish();
}

/// Benchmark many tasks racing for a theatre
fn benchmark_contended_theatre(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_theatre");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    for users in [16usize, 64, 256] {
        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, &users| {
            b.to_async(&runtime).iter(|| async move {
                let theatre = TheatreId::new(1);
                let pool = Arc::new(InMemorySeatPool::builder().max_connections(16).build());
                pool.provision_theatre(theatre, users / 2, 10);
                let reserver = SeatReserver::new(pool, policy());

                let handles: Vec<_> = helpers::users(users)
                    .into_iter()
                    .map(|user| {
                        let reserver = reserver.clone();
                        tokio::spawn(async move { reserver.reserve(&user, theatre).await.is_ok() })
                    })
                    .collect();

                for handle in handles {
                    handle.await.expect("Task failed");
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_reservation,
    benchmark_contended_theatre,
);
criterion_main!(benches);
