use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::FetchError;

/// Retry policy for a single price-source call: a fixed attempt cap with
/// the delay doubling after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, counting the first (minimum 1).
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts. Intended for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Only failures reporting [`FetchError::is_retryable`] get another
/// attempt; `NotFound` and `MalformedResponse` return immediately since
/// repeating the call cannot change the answer. `what` names the source
/// for log lines.
pub async fn with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt == attempts {
                    return Err(err);
                }
                warn!(source = what, attempt, error = %err, "price source call failed; retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                delay *= 2;
            }
        }
    }
    unreachable!("loop returns on the final attempt")
}
