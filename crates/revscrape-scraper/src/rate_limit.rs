//! Rolling-window admission control shared by every transport of one scraper.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grants at most `max_calls` acquisitions per trailing `window`.
///
/// The grant log is only appended to when a caller is actually admitted, so
/// dropping an `acquire()` future mid-wait leaves no phantom entry behind.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_calls` of zero is treated as one.
    #[must_use]
    pub fn new(max_calls: usize, window: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    #[must_use]
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Suspends until a call can proceed without exceeding the quota.
    ///
    /// The lock is held across the wait, so concurrent callers queue behind
    /// it in arrival order and each re-evaluates once the window has moved.
    pub async fn acquire(&self) {
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            while grants
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
            {
                grants.pop_front();
            }

            if grants.len() < self.max_calls {
                grants.push_back(now);
                return;
            }

            let Some(oldest) = grants.front().copied() else {
                continue;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            tracing::debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                max_calls = self.max_calls,
                "rate limit reached; waiting for window to slide"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of grants currently inside the window.
    pub async fn granted_in_window(&self) -> usize {
        let grants = self.grants.lock().await;
        let now = Instant::now();
        grants
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_calls_within_quota_are_immediate() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.granted_in_window().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_beyond_quota_wait_for_the_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let start = Instant::now();
        let mut granted_at = Vec::new();
        for _ in 0..5 {
            limiter.acquire().await;
            granted_at.push(start.elapsed());
        }

        for elapsed in &granted_at[..3] {
            assert!(*elapsed < Duration::from_millis(10), "got {elapsed:?}");
        }
        for elapsed in &granted_at[3..] {
            assert!(*elapsed >= Duration::from_secs(1), "got {elapsed:?}");
            assert!(*elapsed < Duration::from_millis(1100), "got {elapsed:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_records_no_grant() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        limiter.acquire().await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(timed_out.is_err(), "second acquire should still be waiting");
        assert_eq!(limiter.granted_in_window().await, 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.granted_in_window().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_quota() {
        let limiter = std::sync::Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = std::sync::Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();
        assert!(times[1] < Duration::from_millis(10));
        assert!(times[2] >= Duration::from_secs(1));
        assert!(times[3] >= Duration::from_secs(1));
    }

    #[test]
    fn zero_quota_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
    }
}
