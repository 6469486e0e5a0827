//! Exponential backoff for transient agent-call failures (spec §4.8
//! "Retries", §7 "retries are bounded and idempotent-keyed").
//!
//! Only `ShannonError::is_retryable()` kinds (`DependencyUnavailable`,
//! `RateLimited`, `Timeout`) are retried; everything else is surfaced to the
//! caller on the first attempt. Retries are bounded by the task's remaining
//! deadline, never by attempt count alone, so a slow-but-retryable
//! dependency cannot overrun the request's budget.

use std::time::Duration;

use shannon_core::error::ShannonError;

/// Per-dependency backoff configuration. The engine keys one `RetryPolicy`
/// per downstream capability (agent executor, planner, ...) so a flaky
/// provider's backoff never throttles an unrelated one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-indexed: the delay awaited *after*
    /// attempt `attempt` fails, before attempt `attempt + 1`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.base_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Outcome of a bounded retry loop, distinguishing "never even tried" (not
/// retryable) from "ran out of attempts or deadline" from success.
pub enum RetryOutcome<T> {
    Succeeded(T),
    /// The error was permanent; no retry was attempted.
    Permanent(ShannonError),
    /// Every attempt failed and the retry budget (attempts or deadline) was
    /// exhausted.
    Exhausted(ShannonError),
}

/// Run `attempt_fn` under `policy`, retrying transient errors with
/// exponential backoff until either it succeeds, a permanent error occurs,
/// `max_attempts` is reached, or `deadline` elapses (measured against
/// `tokio::time::Instant`, the only clock read permitted on this path since
/// it governs retry *timing*, not decision-path branching — spec §4.8
/// determinism requirement concerns event ordering and classification, not
/// wall-clock backoff sleeps).
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: tokio::time::Instant,
    mut attempt_fn: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ShannonError>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return RetryOutcome::Succeeded(value),
            Err(err) => {
                if !err.is_retryable() {
                    return RetryOutcome::Permanent(err);
                }
                if policy.exhausted(attempt) {
                    return RetryOutcome::Exhausted(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                if tokio::time::Instant::now() + delay >= deadline {
                    return RetryOutcome::Exhausted(err);
                }
                tracing::warn!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
