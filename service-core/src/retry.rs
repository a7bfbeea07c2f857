//! Retry utilities for calls to upstream services.
//!
//! Provides a bounded retry loop with exponential backoff between attempts.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay after every failed attempt.
    pub backoff_multiplier: u32,
    /// Upper bound for a single delay. `None` leaves the backoff uncapped.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    /// Doubling backoff with the given attempt budget and initial delay.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, saturating, then capped.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.saturating_pow(exponent);
        let delay = self.initial_delay.saturating_mul(factor);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Returned when every attempt failed. Carries the error of the last attempt.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    pub operation: String,
    pub attempts: u32,
    pub last_error: E,
}

/// Run `f` until it succeeds or the policy's attempt budget is spent.
///
/// Sleeps `policy.backoff_duration(n)` after failed attempt `n`, except after
/// the final one. Every retryable failure is logged once at `warn` with the
/// attempt number; the final failure is left to the caller.
///
/// # Example
/// ```ignore
/// let text = retry_with_backoff(&RetryPolicy::default(), "send_message", || {
///     session.send_message(&prompt)
/// })
/// .await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                // The caller reports the terminal failure.
                if attempt >= max_attempts {
                    debug!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Call failed after max attempts"
                    );
                    return Err(RetryError {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = policy.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt {} failed. Retrying in {}ms...",
                    attempt,
                    delay.as_millis()
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
