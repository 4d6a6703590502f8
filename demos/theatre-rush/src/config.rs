//! Configuration for the rush demo.
//!
//! Loads configuration from environment variables with sensible defaults.

use seatlock_postgres::PostgresConfig;
use seatlock_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seat store connection
    pub postgres: PostgresConfig,
    /// Retry behaviour of every booker
    pub retry: RetryPolicy,
    /// Shape of the race
    pub rush: RushConfig,
    /// Address the Prometheus scrape endpoint listens on
    pub metrics_addr: SocketAddr,
}

/// How many seats and users take part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RushConfig {
    /// Seats in the theatre
    pub seats: usize,
    /// Seats per printed row
    pub seats_per_row: usize,
    /// Concurrent bookers
    pub users: usize,
    /// Start bookers in random order
    pub shuffle: bool,
}

impl Default for RushConfig {
    fn default() -> Self {
        Self {
            seats: 100,
            seats_per_row: 10,
            users: 120,
            shuffle: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Store settings come from [`PostgresConfig::from_env`] and retry settings from
    /// [`RetryPolicy::from_env`]. The race itself reads `RUSH_SEATS`,
    /// `RUSH_SEATS_PER_ROW`, `RUSH_USERS` and `RUSH_SHUFFLE`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = RushConfig::default();
        Self {
            postgres: PostgresConfig::from_env(),
            retry: RetryPolicy::from_env(),
            rush: RushConfig {
                seats: parse_env("RUSH_SEATS").unwrap_or(defaults.seats),
                seats_per_row: parse_env("RUSH_SEATS_PER_ROW")
                    .unwrap_or(defaults.seats_per_row)
                    .max(1),
                users: parse_env("RUSH_USERS").unwrap_or(defaults.users),
                shuffle: parse_env("RUSH_SHUFFLE").unwrap_or(defaults.shuffle),
            },
            metrics_addr: parse_env("METRICS_ADDR")
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 9090))),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
