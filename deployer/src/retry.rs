//! Retry with linear backoff
//!
//! Attempt `n` (1-based) that fails is followed by a pause of
//! `base_delay * n` before attempt `n + 1`. There is no pause after the
//! last attempt.

use std::future::Future;
use std::time::Duration;

/// Default attempt count for file downloads
pub const MAX_RETRIES: u32 = 3;

/// Default backoff base for file downloads
pub const RETRY_DELAY_BASE: Duration = Duration::from_millis(1500);

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: RETRY_DELAY_BASE,
        }
    }
}

impl RetryPolicy {
    /// A policy always makes at least one attempt
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds or the policy is exhausted
///
/// `op` receives the 1-based attempt number. `on_retry` sees every failure
/// that will be retried, with the pause about to be taken. On exhaustion
/// the error of the last attempt is returned.
pub async fn with_backoff<T, E, Op, Fut, Obs>(
    policy: &RetryPolicy,
    mut on_retry: Obs,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Obs: FnMut(u32, Duration, &E),
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                on_retry(attempt, delay, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
