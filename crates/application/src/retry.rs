//! Bounded retry with differentiated linear backoff
//!
//! Wraps a single boundary call. Failures are classified through
//! [`Retryable`]:
//!
//! - rate-limited: wait `min(attempt * rate_limit_step, rate_limit_cap)`
//! - transient (connection reset, timeout): wait `attempt * transient_step`
//! - permanent: give up immediately
//!
//! # Example
//!
//! ```rust,ignore
//! use application::retry::{RetryPolicy, with_retry};
//!
//! let outcome = with_retry(&RetryPolicy::default(), || async {
//!     transcriber.transcribe(&audio).await
//! }).await;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The remote side explicitly asked us to slow down
    RateLimited,
    /// Connection-level trouble that may go away on its own
    Transient,
    /// Anything else; retrying will not help
    Permanent,
}

/// Errors that can be classified for retrying
pub trait Retryable {
    /// Classify this failure
    fn failure_class(&self) -> FailureClass;
}

/// Retry limits and backoff steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff step after a rate-limited attempt (default: 10s)
    #[serde(default = "default_rate_limit_step_ms")]
    pub rate_limit_step_ms: u64,

    /// Upper bound for rate-limit backoff (default: 60s)
    #[serde(default = "default_rate_limit_cap_ms")]
    pub rate_limit_cap_ms: u64,

    /// Backoff step after a transient failure (default: 3s)
    #[serde(default = "default_transient_step_ms")]
    pub transient_step_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_rate_limit_step_ms() -> u64 {
    10_000
}

const fn default_rate_limit_cap_ms() -> u64 {
    60_000
}

const fn default_transient_step_ms() -> u64 {
    3_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_step_ms: default_rate_limit_step_ms(),
            rate_limit_cap_ms: default_rate_limit_cap_ms(),
            transient_step_ms: default_transient_step_ms(),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt after `attempt` (1-based) failed
    ///
    /// Returns `None` for permanent failures.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, class: FailureClass) -> Option<Duration> {
        let attempt = u64::from(attempt);
        match class {
            FailureClass::RateLimited => Some(Duration::from_millis(
                attempt
                    .saturating_mul(self.rate_limit_step_ms)
                    .min(self.rate_limit_cap_ms),
            )),
            FailureClass::Transient => Some(Duration::from_millis(
                attempt.saturating_mul(self.transient_step_ms),
            )),
            FailureClass::Permanent => None,
        }
    }
}

/// Why a retried call finally gave up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// Every attempt was rate limited
    #[error("rate limit exceeded after {attempts} attempts: {last}")]
    RateLimitExceeded { attempts: u32, last: E },

    /// The last attempt failed with a transient error
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: E },

    /// The call failed with an error that is not worth retrying
    #[error("{0}")]
    NotRetryable(E),
}

impl<E> RetryError<E> {
    /// The underlying error of the final attempt
    pub const fn last_error(&self) -> &E {
        match self {
            Self::RateLimitExceeded { last, .. } | Self::RetriesExhausted { last, .. } => last,
            Self::NotRetryable(err) => err,
        }
    }
}

/// Result of a retried call plus what it took to get there
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result
    pub result: Result<T, RetryError<E>>,
    /// Number of attempts made (1 = no retries)
    pub attempts: u32,
    /// Every backoff wait, in order
    pub waits: Vec<Duration>,
}

impl<T, E> RetryOutcome<T, E> {
    /// Convert to a plain result, discarding metadata
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        self.result
    }

    /// Time spent waiting between attempts
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        self.waits.iter().sum()
    }
}

/// Execute `operation` under `policy`
///
/// The operation is invoked at most `policy.max_attempts` times (at least
/// once). Backoff waits use `tokio::time::sleep` and are the only suspension
/// points besides the operation itself.
#[allow(clippy::cast_possible_truncation)]
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;
    let mut waits = Vec::new();

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "Operation succeeded after retries");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                    waits,
                };
            },
            Err(err) => err,
        };

        let class = err.failure_class();
        let Some(delay) = policy.delay_after(attempts, class) else {
            debug!(attempts, error = %err, "Operation failed with non-retryable error");
            return RetryOutcome {
                result: Err(RetryError::NotRetryable(err)),
                attempts,
                waits,
            };
        };

        if attempts >= max_attempts {
            warn!(attempts, error = %err, ?class, "Operation failed after max attempts");
            let result = match class {
                FailureClass::RateLimited => Err(RetryError::RateLimitExceeded { attempts, last: err }),
                _ => Err(RetryError::RetriesExhausted { attempts, last: err }),
            };
            return RetryOutcome {
                result,
                attempts,
                waits,
            };
        }

        warn!(
            attempt = attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            ?class,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        waits.push(delay);
    }
}
