//! Retry logic with incremental backoff for transient WHOIS failures.
//!
//! The resolver wraps its whole standard-then-backup sequence in a
//! [`RetryExecutor`]; only transport-level failures are worth another round,
//! since re-asking the same servers for text we could not parse changes nothing.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, WatchError};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: usize,
    /// Delay after the first failure; later delays grow by the same amount.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts (at least one).
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed):
    /// `unit × attempt`, so 2s, 4s, 6s...
    pub fn delay_after_attempt(&self, attempt: usize) -> Duration {
        self.unit * attempt.clamp(1, 20) as u32
    }
}

/// Retryable: timeouts, connection failures, empty responses, and exhausted
/// strategy sequences that involved at least one transport failure.
/// Not retryable: invalid input, unparseable text, missing expiry dates.
fn is_retryable(error: &WatchError) -> bool {
    match error {
        WatchError::StrategiesExhausted { transient, .. } => *transient,
        other => other.is_transport(),
    }
}

/// Executes operations with retry logic.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Executes an async operation, retrying retryable failures.
    ///
    /// When attempts run out the returned error carries the *last* failure.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let retryable = is_retryable(&e);

                    if !retryable || attempt >= self.policy.max_attempts {
                        if attempt > 1 {
                            warn!(
                                attempt,
                                max_attempts = self.policy.max_attempts,
                                error = %e,
                                "Operation failed after retries"
                            );
                            return Err(WatchError::RetryExhausted {
                                attempts: attempt,
                                last_error: e.to_string(),
                            });
                        }
                        return Err(e);
                    }

                    let delay = self.policy.delay_after_attempt(attempt);
                    debug!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.unit, Duration::from_secs(2));
        assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn test_linear_delay_grows_by_unit() {
        let policy = RetryPolicy::new().with_unit(Duration::from_secs(2));
        assert_eq!(policy.delay_after_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_secs(6));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&WatchError::Timeout("t".into())));
        assert!(is_retryable(&WatchError::EmptyResponse("s".into())));
        assert!(!is_retryable(&WatchError::ExpiryNotFound));
        assert!(!is_retryable(&WatchError::InvalidDomain("x".into())));
        assert!(is_retryable(&WatchError::StrategiesExhausted {
            domain: "a.com".into(),
            last_error: "timeout".into(),
            transient: true,
        }));
        assert!(!is_retryable(&WatchError::StrategiesExhausted {
            domain: "a.com".into(),
            last_error: "no date".into(),
            transient: false,
        }));
    }

    #[tokio::test]
    async fn test_executor_retries_then_succeeds() {
        let executor = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_unit(Duration::from_millis(1)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let result: Result<&str> = executor
            .execute(|_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(WatchError::Timeout("slow".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_executor_stops_on_non_retryable() {
        let executor = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_unit(Duration::from_millis(1)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let result: Result<()> = executor
            .execute(|_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(WatchError::ExpiryNotFound)
                }
            })
            .await;

        assert!(matches!(result, Err(WatchError::ExpiryNotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_executor_reports_last_error() {
        let executor = RetryExecutor::new(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_unit(Duration::from_millis(1)),
        );

        let result: Result<()> = executor
            .execute(|attempt| async move {
                Err(WatchError::Timeout(format!("attempt {}", attempt)))
            })
            .await;

        match result.unwrap_err() {
            WatchError::RetryExhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("attempt 3"));
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }
}
