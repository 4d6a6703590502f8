//! Store abstraction for the reservation protocol.
//!
//! The protocol needs three things from its backing store, modelled as three traits
//! that mirror a connection pool, a pooled connection and a transaction:
//!
//! - [`SeatPool`]: lends connections. The returned connection goes back to the pool
//!   when it is dropped, on every exit path.
//! - [`SeatConnection`]: opens a transaction.
//! - [`SeatTransaction`]: locks the lowest free seat, assigns an owner and commits.
//!   Dropping a transaction without calling [`SeatTransaction::commit`] rolls it back
//!   and releases every row lock it holds.
//!
//! # Implementations
//!
//! - `PostgresSeatPool` (in `seatlock-postgres`): production implementation on sqlx
//! - `InMemorySeatPool` (in `seatlock-testing`): row-locking in-memory store with
//!   fault injection, for deterministic tests

use crate::error::AttemptError;
use crate::seat::{Seat, SeatId, TheatreId, UserId};
use std::future::Future;

/// Lends transactional connections.
///
/// Implementations must support concurrent callers and must never hand out a
/// connection that still carries an open transaction from a previous borrower.
pub trait SeatPool: Send + Sync {
    /// Connection type lent by this pool.
    type Connection: SeatConnection;

    /// Borrow a connection, waiting if the pool is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::Connection`] if no connection can be obtained.
    fn acquire(&self) -> impl Future<Output = Result<Self::Connection, AttemptError>> + Send;
}

/// A borrowed connection. Returned to its pool on drop.
pub trait SeatConnection: Send {
    /// Transaction type opened on this connection.
    type Transaction<'c>: SeatTransaction
    where
        Self: 'c;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::Transaction`] if the store refuses to start one.
    fn begin(
        &mut self,
    ) -> impl Future<Output = Result<Self::Transaction<'_>, AttemptError>> + Send;
}

/// An open transaction. Rolled back on drop unless committed.
pub trait SeatTransaction: Send {
    /// Select the lowest-id seat of `theatre` whose owner is unset and take an
    /// exclusive row lock on it for the rest of the transaction.
    ///
    /// Blocks (never skips) while another transaction holds the lock on that row.
    /// Returns `Ok(None)` when the theatre has no free seat.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::Contention`] on deadlock or lock-wait timeout, and
    /// [`AttemptError::Query`] for any other store failure.
    fn lock_first_available(
        &mut self,
        theatre: TheatreId,
    ) -> impl Future<Output = Result<Option<Seat>, AttemptError>> + Send;

    /// Set the owner of `seat` (and only that seat) to `owner`.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::Update`] if the store rejects the write, or
    /// [`AttemptError::Contention`] if it was aborted by a conflicting transaction.
    fn assign_owner(
        &mut self,
        seat: SeatId,
        owner: UserId,
    ) -> impl Future<Output = Result<u64, AttemptError>> + Send;

    /// Commit, making the assignment durable and releasing row locks.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::Commit`] or [`AttemptError::Contention`]; in both
    /// cases nothing written by this transaction is persisted.
    fn commit(self) -> impl Future<Output = Result<(), AttemptError>> + Send;
}
