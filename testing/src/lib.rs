//! # Seat Lock Testing
//!
//! Testing utilities for the reservation protocol.
//!
//! This crate provides:
//! - [`InMemorySeatPool`]: a row-locking in-memory store implementing the
//!   `seatlock-core` store traits, with fault injection
//! - [`helpers`]: user generators and tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_runtime::{RetryPolicy, SeatReserver};
//! use seatlock_testing::{InMemorySeatPool, helpers};
//!
//! #[tokio::test]
//! async fn books_first_seat() {
//!     let pool = Arc::new(InMemorySeatPool::new());
//!     pool.provision_theatre(TheatreId::new(1), 10, 5);
//!
//!     let reserver = SeatReserver::new(pool, RetryPolicy::default());
//!     let seat = reserver.reserve(&helpers::user(1), TheatreId::new(1)).await.unwrap();
//!     assert_eq!(seat.id, SeatId::new(1));
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// In-memory seat store
pub mod seat_pool;

pub use seat_pool::{
    InMemoryConnection, InMemorySeatPool, InMemorySeatPoolBuilder, InMemoryTransaction,
};

/// Test helpers.
pub mod helpers {
    use seatlock_core::{User, UserId};

    /// A user with ID `id` named `user-{id}`.
    #[must_use]
    pub fn user(id: i64) -> User {
        User::new(UserId::new(id), format!("user-{id}"))
    }

    /// Users with IDs `1..=count`.
    #[must_use]
    pub fn users(count: usize) -> Vec<User> {
        (1..=i64::try_from(count).unwrap_or(i64::MAX)).map(user).collect()
    }

    /// Install a test tracing subscriber honouring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "seatlock_runtime=debug,seatlock_testing=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}
