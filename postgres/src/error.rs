//! Error mapping between sqlx and the reservation protocol.

use seatlock_core::{AttemptError, SeatId};
use thiserror::Error;

/// SQLSTATE codes that mean "lost a race, try again".
///
/// - `40P01` deadlock_detected
/// - `40001` serialization_failure
/// - `55P03` lock_not_available (raised when `lock_timeout` expires)
const CONTENTION_CODES: [&str; 3] = ["40P01", "40001", "55P03"];

/// Errors from store setup, provisioning and inspection.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// Query or connection failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Whether the store aborted the statement because of a conflicting transaction.
#[must_use]
pub fn is_contention(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| CONTENTION_CODES.contains(&code.as_ref()))
}

/// Map a failure of the locking select.
pub(crate) fn select_error(err: &sqlx::Error) -> AttemptError {
    if is_contention(err) {
        AttemptError::Contention(err.to_string())
    } else {
        AttemptError::Query(err.to_string())
    }
}

/// Map a failure of the owner update.
pub(crate) fn update_error(seat: SeatId, err: &sqlx::Error) -> AttemptError {
    if is_contention(err) {
        AttemptError::Contention(err.to_string())
    } else {
        AttemptError::Update {
            seat,
            reason: err.to_string(),
        }
    }
}

/// Map a commit failure.
pub(crate) fn commit_error(err: &sqlx::Error) -> AttemptError {
    if is_contention(err) {
        AttemptError::Contention(err.to_string())
    } else {
        AttemptError::Commit(err.to_string())
    }
}

/// Map a failure to borrow a pooled connection.
pub(crate) fn acquire_error(err: &sqlx::Error) -> AttemptError {
    AttemptError::Connection(err.to_string())
}

/// Map a failure of `BEGIN`.
pub(crate) fn begin_error(err: &sqlx::Error) -> AttemptError {
    AttemptError::Transaction(err.to_string())
}
