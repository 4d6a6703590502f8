//! # Seat Lock Runtime
//!
//! The reservation coordinator and its retry policy.
//!
//! ## Core Components
//!
//! - **[`SeatReserver`]**: claims one free seat per call, generic over any
//!   [`seatlock_core::SeatPool`]
//! - **[`RetryPolicy`]**: bounded attempts with linear backoff
//! - **[`metrics`]**: Prometheus counters for attempts, failures and outcomes
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_runtime::{RetryPolicy, SeatReserver};
//! use seatlock_postgres::PostgresSeatPool;
//!
//! let pool = PostgresSeatPool::connect(&config).await?;
//! let reserver = SeatReserver::new(Arc::new(pool), RetryPolicy::from_env());
//!
//! let seat = reserver.reserve(&user, theatre_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Bounded retries with linear backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// The reservation coordinator
pub mod reserver;

pub use reserver::SeatReserver;
pub use retry::{RetryError, RetryPolicy, RetryPolicyBuilder, retry_with_policy};
