//! Bounded retries with linear backoff.
//!
//! A reservation is retried as a whole: every attempt opens a fresh transaction, so
//! retrying can never duplicate an assignment. The wait after attempt `n` is
//! `n × backoff_unit`, so the pause grows linearly with the attempt index.
//!
//! # Example
//!
//! ```rust
//! use seatlock_runtime::retry::{RetryPolicy, retry_with_policy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .backoff_unit(Duration::from_millis(50))
//!     .build();
//!
//! let result = retry_with_policy(&policy, |_attempt| async {
//!     Ok::<_, String>(42)
//! }, |_err| true).await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Retry policy for reservations.
///
/// # Default Values
///
/// - `max_attempts`: 2 (attempts in total, not retries)
/// - `backoff_unit`: 1 second
/// - `max_delay`: 30 seconds
/// - `fail_fast_when_sold_out`: `false`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: usize,
    /// Wait per attempt index between attempts
    pub backoff_unit: Duration,
    /// Upper bound on a single wait
    pub max_delay: Duration,
    /// Stop immediately when an attempt finds no free seat instead of retrying
    pub fail_fast_when_sold_out: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            fail_fast_when_sold_out: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            backoff_unit: None,
            max_delay: None,
            fail_fast_when_sold_out: None,
        }
    }

    /// Load the policy from environment variables, falling back to defaults.
    ///
    /// - `RESERVE_MAX_ATTEMPTS`
    /// - `RESERVE_BACKOFF_UNIT_MS`
    /// - `RESERVE_MAX_DELAY_MS`
    /// - `RESERVE_FAIL_FAST_SOLD_OUT`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::builder()
            .max_attempts(
                env::var("RESERVE_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.max_attempts),
            )
            .backoff_unit(
                env::var("RESERVE_BACKOFF_UNIT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map_or(defaults.backoff_unit, Duration::from_millis),
            )
            .max_delay(
                env::var("RESERVE_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map_or(defaults.max_delay, Duration::from_millis),
            )
            .fail_fast_when_sold_out(
                env::var("RESERVE_FAIL_FAST_SOLD_OUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.fail_fast_when_sold_out),
            )
            .build()
    }

    /// Wait to apply after the given (1-based) attempt failed.
    ///
    /// Linear: `attempt × backoff_unit`, capped at `max_delay`.
    #[must_use]
    pub fn delay_after_attempt(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.backoff_unit
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<usize>,
    backoff_unit: Option<Duration>,
    max_delay: Option<Duration>,
    fail_fast_when_sold_out: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts. Values below 1 are raised to 1.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the wait per attempt index.
    #[must_use]
    pub const fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = Some(unit);
        self
    }

    /// Set the cap on a single wait.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Stop retrying as soon as an attempt finds the theatre sold out.
    #[must_use]
    pub const fn fail_fast_when_sold_out(mut self, enabled: bool) -> Self {
        self.fail_fast_when_sold_out = Some(enabled);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            backoff_unit: self.backoff_unit.unwrap_or(defaults.backoff_unit),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            fail_fast_when_sold_out: self
                .fail_fast_when_sold_out
                .unwrap_or(defaults.fail_fast_when_sold_out),
        }
    }
}

/// Why [`retry_with_policy`] gave up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the final attempt's error.
    #[error("Operation failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: usize,
        /// Final error
        last: E,
    },
    /// An attempt failed with an error the predicate refused to retry.
    #[error("Operation aborted on attempt {attempts}: {error}")]
    Aborted {
        /// Attempts made, including the aborting one
        attempts: usize,
        /// The non-retryable error
        error: E,
    },
}

/// Run `operation` until it succeeds, the predicate rejects an error, or the
/// attempt budget is spent.
///
/// `operation` receives the 1-based attempt number. Between attempts the task
/// sleeps for [`RetryPolicy::delay_after_attempt`]; there is no sleep after the
/// final attempt.
///
/// # Errors
///
/// Returns [`RetryError::Exhausted`] when all `max_attempts` attempts failed and
/// [`RetryError::Aborted`] when `is_retryable` returned `false`.
pub async fn retry_with_policy<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "Error is not retryable, failing immediately"
                    );
                    return Err(RetryError::Aborted {
                        attempts: attempt,
                        error: err,
                    });
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        attempt,
                        error = %err,
                        "Operation failed after max attempts"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = policy.delay_after_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
