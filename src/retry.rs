//! Bounded retry with exponential backoff for outbound calls.

use crate::config::AppSettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how patiently a failing call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_BACKOFF,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_settings(app: &AppSettings) -> Self {
        Self::new(
            app.max_retry_attempts,
            Duration::from_millis(app.retry_backoff_ms),
        )
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

/// Run `call` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Only errors for which [`crate::error::VidquizError::is_transient`] holds are
/// retried. `call` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} attempt {}/{} failed: {} (retrying in {:?})",
                    operation, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    error!("{} failed after {} attempts: {}", operation, attempt, e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VidquizError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast(3), "test", move |_| async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(VidquizError::transient("Test", "503"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(&fast(2), "test", move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VidquizError::transient("Test", "timeout"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(&fast(5), "test", move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VidquizError::Auth("bad key".into()))
        })
        .await;

        assert!(matches!(result, Err(VidquizError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<()> = with_retry(&RetryPolicy::none(), "test", move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VidquizError::transient("Test", "503"))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
