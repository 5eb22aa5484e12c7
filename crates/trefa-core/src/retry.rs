//! Bounded retry with exponential backoff.
//!
//! Every network stage of the sync (source page fetch, attachment fetch, upload,
//! cache commit) goes through [`retry_with_backoff`] with its own [`RetryPolicy`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Upper bound for a single backoff sleep so that large retry counts stay sane.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay slept after failed attempt `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_BACKOFF)
            .min(MAX_RETRY_BACKOFF)
    }
}

/// Run `op` until it succeeds or the policy is exhausted; returns the last error.
///
/// `operation` only labels log lines.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    operation = operation,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    operation = operation,
                    attempts = attempt + 1,
                    error = %e,
                    "Giving up after retries"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_exponential_then_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(8), Duration::from_secs(256));
        assert_eq!(policy.backoff(9), MAX_RETRY_BACKOFF);
        assert_eq!(policy.backoff(40), MAX_RETRY_BACKOFF);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<&str, String> = retry_with_backoff(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("failure {}", n))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), String> = retry_with_backoff(policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always".to_string()) }
        })
        .await;

        assert_eq!(result, Err("always".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(RetryPolicy::none(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
