//! The reservation coordinator.
//!
//! [`SeatReserver::reserve`] claims the lowest-id free seat of a theatre for a user.
//! One attempt is a single transaction:
//!
//! 1. borrow a connection from the pool
//! 2. begin a transaction
//! 3. `SELECT ... ORDER BY id LIMIT 1 FOR UPDATE` the lowest free seat
//! 4. set its owner, scoped by seat id
//! 5. commit
//!
//! Every attempt takes its row locks in ascending id order, so two attempts only
//! ever conflict on the same row: the later one waits for the earlier to finish and
//! then moves on to the next free seat, or the store aborts it (deadlock, lock-wait
//! timeout) and the attempt is retried after a linear backoff.
//!
//! Connections and transactions are released by `Drop`, so an attempt that fails at
//! any step leaves nothing behind: the transaction rolls back and the connection
//! goes back to the pool.

use crate::metrics::ReservationMetrics;
use crate::retry::{RetryError, RetryPolicy, retry_with_policy};
use seatlock_core::{
    AttemptError, FailureKind, ReservationError, Seat, SeatConnection, SeatPool,
    SeatTransaction, TheatreId, User,
};
use std::sync::Arc;
use std::time::Instant;

/// Reserves seats against a [`SeatPool`].
///
/// Holds no mutable state of its own; clone the `Arc` or share a reference across
/// tasks freely.
///
/// # Example
///
/// ```no_run
/// use seatlock_core::{SeatPool, TheatreId, User, UserId};
/// use seatlock_runtime::{RetryPolicy, SeatReserver};
/// use std::sync::Arc;
///
/// async fn book<P: SeatPool>(pool: Arc<P>) -> Result<(), Box<dyn std::error::Error>> {
///     let reserver = SeatReserver::new(pool, RetryPolicy::default());
///     let user = User::new(UserId::new(1), "ada");
///
///     let seat = reserver.reserve(&user, TheatreId::new(1)).await?;
///     println!("{} booked seat {}", user.name, seat.name);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SeatReserver<P> {
    pool: Arc<P>,
    policy: RetryPolicy,
}

impl<P> Clone for SeatReserver<P> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            policy: self.policy.clone(),
        }
    }
}

impl<P: SeatPool> SeatReserver<P> {
    /// Create a reserver over `pool`.
    #[must_use]
    pub const fn new(pool: Arc<P>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// The retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Reserve one free seat of `theatre` for `user`.
    ///
    /// On success the returned seat's owner is `user.id` and no other call will ever
    /// return the same seat.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidRequest`] if the user has no usable identity
    /// - [`ReservationError::SoldOut`] if the policy fails fast and the theatre
    ///   has no free seat
    /// - [`ReservationError::Exhausted`] once every attempt has failed; the final
    ///   attempt's cause is kept as the error source
    ///
    /// No seat is modified when an error is returned.
    #[tracing::instrument(skip_all, fields(user_id = %user.id, theatre_id = %theatre))]
    pub async fn reserve(&self, user: &User, theatre: TheatreId) -> Result<Seat, ReservationError> {
        if user.id.get() <= 0 {
            return Err(ReservationError::InvalidRequest(format!(
                "user {} has no persisted identity",
                user.id
            )));
        }

        let started = Instant::now();
        let _in_flight = ReservationMetrics::record_started();

        let fail_fast = self.policy.fail_fast_when_sold_out;
        let result = retry_with_policy(
            &self.policy,
            |attempt| self.attempt(user, theatre, attempt),
            |err: &AttemptError| !(fail_fast && err.kind() == FailureKind::NoAvailability),
        )
        .await;

        match result {
            Ok(seat) => {
                ReservationMetrics::record_success(started.elapsed());
                tracing::info!(seat_id = %seat.id, seat = %seat.name, "Seat booked");
                Ok(seat)
            }
            Err(RetryError::Aborted {
                attempts,
                error: AttemptError::NoAvailability(theatre),
            }) => {
                ReservationMetrics::record_sold_out(started.elapsed());
                Err(ReservationError::SoldOut { theatre, attempts })
            }
            Err(RetryError::Exhausted { attempts, last } | RetryError::Aborted { attempts, error: last }) => {
                ReservationMetrics::record_exhausted(started.elapsed());
                Err(ReservationError::Exhausted { attempts, last })
            }
        }
    }

    /// One attempt, with its outcome recorded.
    async fn attempt(
        &self,
        user: &User,
        theatre: TheatreId,
        attempt: usize,
    ) -> Result<Seat, AttemptError> {
        ReservationMetrics::record_attempt();
        tracing::debug!(attempt, "Reservation attempt started");

        let result = self.try_book(user, theatre).await;
        if let Err(err) = &result {
            ReservationMetrics::record_attempt_failure(err.kind());
            tracing::debug!(attempt, kind = err.kind().as_str(), error = %err, "Reservation attempt failed");
        }
        result
    }

    /// Acquire, begin, lock, assign, commit.
    ///
    /// `tx` borrows `conn`, so on every early return the transaction is dropped
    /// (rolled back) before the connection goes back to the pool.
    async fn try_book(&self, user: &User, theatre: TheatreId) -> Result<Seat, AttemptError> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let Some(seat) = tx.lock_first_available(theatre).await? else {
            return Err(AttemptError::NoAvailability(theatre));
        };

        let changed = tx.assign_owner(seat.id, user.id).await?;
        if changed != 1 {
            return Err(AttemptError::Update {
                seat: seat.id,
                reason: format!("expected 1 row to change, got {changed}"),
            });
        }

        tx.commit().await?;
        Ok(seat.assigned_to(user.id))
    }
}
