//! Bounded exponential backoff for rate-limited provider calls.
//!
//! Only errors that classify themselves as rate-limited are retried. Every
//! other failure is returned on the spot. Waiting happens on the tokio timer,
//! so a pending retry is an ordinary await point the caller may drop.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that can tell the executor whether they came from rate limiting.
pub trait RateLimitAware {
    /// Whether this failure is the provider's rate-limit signal.
    fn is_rate_limited(&self) -> bool;

    /// Optional server hint for how long to wait.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Attempt budget and starting delay for [`execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after every retry.
    pub initial_delay: Duration,
}

impl BackoffPolicy {
    /// Default attempt budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default delay before the first retry.
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
    /// Longest wait a provider's `retry_after` hint can impose.
    pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_INITIAL_DELAY)
    }
}

/// Runs `operation`, retrying rate-limited failures with doubling delays.
///
/// The wait before a retry is the current backoff delay, or the error's
/// `retry_after` hint when that is longer. Hints are capped at
/// [`BackoffPolicy::MAX_RETRY_AFTER`].
///
/// # Errors
///
/// Returns the first non-rate-limited error, or the last rate-limited error
/// once `policy.max_attempts` attempts have been made.
pub async fn execute<T, E, F, Fut>(policy: &BackoffPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitAware + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempt < max_attempts => {
                let wait = err.retry_after().map_or(delay, |hint| {
                    hint.min(BackoffPolicy::MAX_RETRY_AFTER).max(delay)
                });
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "rate limited; backing off before retry"
                );
                tokio::time::sleep(wait).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
