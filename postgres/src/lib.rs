//! `PostgreSQL` seat store for Seat Lock.
//!
//! This crate implements the `SeatPool`, `SeatConnection` and `SeatTransaction`
//! traits from `seatlock-core` on top of sqlx. Mutual exclusion comes from row locks:
//! the first free seat of a theatre is selected `FOR UPDATE`, so two concurrent
//! attempts never hold the same row, and a lock wait longer than `lock_timeout`
//! surfaces as contention that the reserver retries.
//!
//! It also provides:
//!
//! - Schema migrations (`theatres`, `users`, `seats`)
//! - Theatre and user provisioning
//! - Reset and read-only inspection of committed seats
//!
//! # Example
//!
//! ```no_run
//! use seatlock_postgres::{PostgresConfig, PostgresSeatPool};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresSeatPool::connect(&PostgresConfig::from_env()).await?;
//! store.migrate().await?;
//! let (theatre, _seats) = store.provision_theatre("Main Hall", 100, 10).await?;
//! println!("{}", store.seat_map(theatre.id, 10).await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
mod inventory;
pub mod pool;

pub use config::PostgresConfig;
pub use error::{PostgresError, is_contention};
pub use pool::{PgSeatConnection, PgSeatTransaction, PostgresSeatPool};
