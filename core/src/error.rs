//! Error taxonomy for seat reservation.
//!
//! Failures are reported at two levels:
//!
//! - [`AttemptError`]: why a single acquire-lock-assign-commit cycle failed. Every
//!   variant maps onto a [`FailureKind`], which the retry loop consults.
//! - [`ReservationError`]: the definitive, caller-facing outcome of a reservation
//!   after the retry budget is spent.

use crate::seat::{SeatId, TheatreId};
use thiserror::Error;

/// Coarse classification of an attempt failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Could not obtain a connection or open a transaction
    Infrastructure,
    /// Deadlock, lock-wait timeout or serialization failure reported by the store
    Contention,
    /// No unowned seat is left in the theatre
    NoAvailability,
    /// The owner update or the commit failed for a non-contention reason
    Mutation,
}

impl FailureKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::Contention => "contention",
            Self::NoAvailability => "no_availability",
            Self::Mutation => "mutation",
        }
    }
}

/// Why one reservation attempt failed.
///
/// By the time an `AttemptError` is observed the attempt's transaction has already
/// been rolled back and its connection returned to the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The pool could not lend a connection.
    #[error("Error getting connection from pool: {0}")]
    Connection(String),

    /// A transaction could not be opened on the borrowed connection.
    #[error("Error beginning transaction: {0}")]
    Transaction(String),

    /// The store aborted the attempt because of a conflicting transaction.
    #[error("Lock contention: {0}")]
    Contention(String),

    /// The locking select found no free seat.
    #[error("No available seat in theatre {0}")]
    NoAvailability(TheatreId),

    /// The locking select failed for a non-contention reason.
    #[error("Error querying seat: {0}")]
    Query(String),

    /// The owner update failed or touched no row.
    #[error("Error updating seat {seat}: {reason}")]
    Update {
        /// Seat whose owner could not be set
        seat: SeatId,
        /// Store-reported reason
        reason: String,
    },

    /// Commit failed; the mutation is void.
    #[error("Error committing transaction: {0}")]
    Commit(String),
}

impl AttemptError {
    /// Classify this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Connection(_) | Self::Transaction(_) | Self::Query(_) => {
                FailureKind::Infrastructure
            }
            Self::Contention(_) => FailureKind::Contention,
            Self::NoAvailability(_) => FailureKind::NoAvailability,
            Self::Update { .. } | Self::Commit(_) => FailureKind::Mutation,
        }
    }
}

/// Definitive outcome of a failed reservation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Every attempt failed. `last` is the cause of the final attempt.
    #[error("Could not book seat after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made (the configured budget)
        attempts: usize,
        /// Failure of the final attempt
        #[source]
        last: AttemptError,
    },

    /// The theatre has no free seat and the policy does not retry that case.
    #[error("Theatre {theatre} is sold out (after {attempts} attempts)")]
    SoldOut {
        /// Theatre that was searched
        theatre: TheatreId,
        /// Attempts made before giving up
        attempts: usize,
    },

    /// The request could not be attempted at all.
    #[error("Invalid reservation request: {0}")]
    InvalidRequest(String),
}

impl ReservationError {
    /// Number of attempts made before this error was returned.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. } | Self::SoldOut { attempts, .. } => *attempts,
            Self::InvalidRequest(_) => 0,
        }
    }

    /// Kind of the last underlying attempt failure, if any attempt ran.
    #[must_use]
    pub const fn last_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Exhausted { last, .. } => Some(last.kind()),
            Self::SoldOut { .. } => Some(FailureKind::NoAvailability),
            Self::InvalidRequest(_) => None,
        }
    }
}
