//! Exponential backoff with jitter around any fallible async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use revscrape_core::{seconds, AppConfig};

/// Backoff schedule: `min(base * factor^attempt, max)` plus up to 10% jitter.
///
/// With `max_retries = 2` the operation runs at most three times.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: seconds(config.retry_base_delay_secs),
            max_delay: seconds(config.retry_max_delay_secs),
            backoff_factor: config.retry_backoff_factor,
        }
    }

    /// A policy that retries immediately; useful in tests.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay before retry number `attempt + 1`, without jitter.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        seconds(capped)
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let delay = self.backoff_for(attempt);
        delay.saturating_add(seconds(delay.as_secs_f64() * rand::random::<f64>() * 0.1))
    }
}

/// Runs `operation` until it succeeds or `policy.max_retries + 1` attempts
/// have failed, returning the last error in that case.
///
/// Every error is retried; callers that want to short-circuit should map the
/// condition to `Ok` before it reaches this function.
///
/// # Errors
///
/// Returns the final error produced by `operation`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_retries => return Err(err),
            Err(err) => {
                let delay = policy.jittered(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "attempt failed; retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    type Attempt = Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>;

    /// Fails the first `failures` calls, then returns the call index.
    fn flaky(failures: u32, counter: &Arc<AtomicU32>) -> impl FnMut() -> Attempt {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(format!("failure {n}"))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_with_backoff(&RetryPolicy::immediate(3), flaky(0, &calls)).await;
        assert_eq!(result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn k_failures_then_success_takes_k_plus_one_calls() {
        for k in 0..=3 {
            let calls = Arc::new(AtomicU32::new(0));
            let result = retry_with_backoff(&RetryPolicy::immediate(3), flaky(k, &calls)).await;
            assert_eq!(result, Ok(k));
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test]
    async fn exhausting_retries_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_with_backoff(&RetryPolicy::immediate(2), flaky(u32::MAX, &calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err("failure 2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_follow_the_backoff_schedule() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();
        let _ = retry_with_backoff(&policy, flaky(u32::MAX, &calls)).await;
        let elapsed = start.elapsed();
        // 1s + 2s of backoff, each with at most 10% jitter.
        assert!(elapsed >= Duration::from_secs(3), "got {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(3300), "got {elapsed:?}");
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        };
        assert_eq!(policy.backoff_for(0), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(40));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(60));
        assert_eq!(policy.backoff_for(30), Duration::from_secs(60));
    }

    #[test]
    fn policy_reads_config() {
        let policy = RetryPolicy::from_config(&AppConfig::default());
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_secs(5));
    }

    #[test]
    fn oversized_config_saturates_without_panicking() {
        let config = AppConfig {
            retry_base_delay_secs: 1e30,
            retry_max_delay_secs: 1e30,
            ..AppConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_delay, Duration::MAX);
        assert_eq!(policy.backoff_for(3), Duration::MAX);
        assert_eq!(policy.jittered(3), Duration::MAX);
    }
}
