//! Bounded retry with exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use relmirror_config::DEFAULT_MAX_ATTEMPTS;
use relmirror_github::GitHubError;
use relmirror_storage::StorageError;
use tracing::warn;

use crate::error::SyncError;

/// Delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Errors that can tell whether a retry may help.
pub trait Transient {
    /// `true` for transport faults, timeouts, throttling and server errors.
    fn is_transient(&self) -> bool;
}

impl Transient for GitHubError {
    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }
}

impl Transient for StorageError {
    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }
}

impl Transient for SyncError {
    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }
}

/// Delay before retry number `retry` (0-indexed): `base * 2^retry`.
#[must_use]
pub fn retry_delay(retry: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry))
}

/// How often and how patiently transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first; at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy that runs every operation exactly once.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `attempt`.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, E>
    where
        T: Send,
        E: Transient + std::fmt::Display + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let mut tries = 1_u32;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && tries < self.max_attempts => {
                    let delay = retry_delay(tries - 1, self.base_delay);
                    warn!(
                        operation,
                        attempt = tries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    tries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(code: u16) -> StorageError {
        StorageError::Status {
            operation: "write",
            path: "qsctl/v1/a".to_string(),
            status: code,
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delay_doubles_per_retry() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(0, base), Duration::from_millis(500));
        assert_eq!(retry_delay(1, base), Duration::from_secs(1));
        assert_eq!(retry_delay(2, base), Duration::from_secs(2));
        assert!(retry_delay(40, Duration::from_secs(u64::MAX / 2)) > Duration::ZERO);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(3)
            .run("write", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status(503))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert!(matches!(result, Ok("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(2)
            .run("write", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status(500))
            })
            .await;
        assert!(matches!(result, Err(StorageError::Status { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(5)
            .run("stat", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status(403))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let not_found: Result<(), _> = RetryPolicy::default()
            .run("stat", || async {
                Err(StorageError::NotFound {
                    path: "a".to_string(),
                })
            })
            .await;
        assert!(not_found.is_err_and(|err| err.is_not_found()));
    }
}
