//! Minimum spacing between outbound requests

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum interval between consecutive calls to [`RateLimiter::wait`]
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    pub async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(1000);
        assert_eq!(limiter.min_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(200);

        let start = Instant::now();

        // First request - no wait
        limiter.wait().await;
        let first_elapsed = start.elapsed();

        // Second request - should wait ~200ms
        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        assert!(second_elapsed >= Duration::from_millis(180));
    }
}
