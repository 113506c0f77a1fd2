//! Retry with exponential backoff for transient failures
//!
//! Used around language model requests. The default policy performs no
//! retries at all; deployments opt in through `[llm.retry]` in the TOML config.
//!
//! **Backoff Strategy:**
//! - First retry waits `initial_backoff`
//! - Each further retry doubles the wait
//! - Waits are capped at `max_backoff`

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use utamemo_common::config::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Errors for which `is_transient` returns false are returned immediately.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if retry > 0 {
                    tracing::info!(operation = operation_name, retries = retry, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) || retry >= policy.max_retries {
                    if retry > 0 {
                        tracing::error!(
                            operation = operation_name,
                            retries = retry,
                            error = %err,
                            "Operation failed after retries"
                        );
                    }
                    return Err(err);
                }

                retry += 1;
                let backoff = policy.backoff_for(retry);
                tracing::warn!(
                    operation = operation_name,
                    retry,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(3000),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(3000));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_default_config_means_no_retries() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_retries, 0);
    }

    #[tokio::test]
    async fn test_no_retry_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff("test", &RetryPolicy::none(), |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff("test", &fast_policy(3), |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff("test", &fast_policy(5), |e: &String| e != "fatal", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let _: Result<(), String> = retry_with_backoff("test", &fast_policy(2), |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("again".to_string()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
