//! Theatre Rush
//!
//! Provisions a theatre, then lets more users than there are seats try to book at
//! the same moment. Every seat ends up with exactly one owner and the losers get a
//! "Could not book seat" error once their retries run out.
//!
//! # Usage
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres -e POSTGRES_DB=seatlock postgres:16
//!
//! RUSH_SEATS=50 RUSH_USERS=80 cargo run -p theatre-rush
//! ```

mod config;

use anyhow::Context;
use config::Config;
use futures::future::join_all;
use rand::seq::SliceRandom;
use seatlock_core::ReservationError;
use seatlock_postgres::PostgresSeatPool;
use seatlock_runtime::SeatReserver;
use seatlock_runtime::metrics::MetricsServer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Barrier;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seatlock_runtime=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        seats = config.rush.seats,
        users = config.rush.users,
        max_attempts = config.retry.max_attempts,
        "Starting theatre rush"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr);
    metrics.serve().context("serving metrics")?;

    let store = PostgresSeatPool::connect(&config.postgres)
        .await
        .context("connecting to the seat store")?;
    store.migrate().await.context("running migrations")?;

    let (theatre, _) = store
        .provision_theatre("Grand Theatre", config.rush.seats, config.rush.seats_per_row)
        .await?;
    let mut users = store.create_users("patron", config.rush.users).await?;
    if config.rush.shuffle {
        users.shuffle(&mut rand::thread_rng());
    }

    println!(
        "\n{} users racing for {} seats in {} (theatre {})\n",
        users.len(),
        config.rush.seats,
        theatre.name,
        theatre.id
    );

    let reserver = SeatReserver::new(Arc::new(store.clone()), config.retry.clone());
    let start_line = Arc::new(Barrier::new(users.len()));
    let started = Instant::now();

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let reserver = reserver.clone();
            let start_line = Arc::clone(&start_line);
            let theatre = theatre.id;
            tokio::spawn(async move {
                start_line.wait().await;
                let result = reserver.reserve(&user, theatre).await;
                (user, result)
            })
        })
        .collect();

    let mut booked = 0usize;
    let mut failures: BTreeMap<String, usize> = BTreeMap::new();
    for joined in join_all(handles).await {
        let (user, result) = joined.context("booking task panicked")?;
        match result {
            Ok(seat) => {
                booked += 1;
                tracing::debug!(user = %user.name, seat = %seat.name, "Booked");
            }
            Err(err) => {
                tracing::debug!(user = %user.name, error = %err, "Gave up");
                *failures.entry(failure_label(&err)).or_default() += 1;
            }
        }
    }
    let elapsed = started.elapsed();

    println!("Booked:  {booked}");
    println!("Failed:  {}", failures.values().sum::<usize>());
    for (reason, count) in &failures {
        println!("  {count:>5}  {reason}");
    }
    println!("Elapsed: {elapsed:.2?}\n");

    let map = store.seat_map(theatre.id, config.rush.seats_per_row).await?;
    println!("{map}");
    println!("{} booked, {} free\n", map.booked(), map.available());

    if let Some(text) = metrics.render() {
        println!("{text}");
    }

    Ok(())
}

fn failure_label(err: &ReservationError) -> String {
    match err.last_kind() {
        Some(kind) => format!("{err} (last failure: {})", kind.as_str()),
        None => err.to_string(),
    }
}
