//! Retry with exponential backoff around fallible async operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt ceiling and backoff base for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        2u32.checked_pow(attempt_index)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Invoke `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Every failure is retried the same way; the last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(policy, operation, |_: &E| true, op).await
}

/// Like [`with_retry`], but gives up at once on errors `should_retry` rejects.
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    mut should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    "Attempt failed: {}",
                    err
                );

                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                tokio::time::sleep(policy.delay_for(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(64), Duration::MAX);
    }

    #[test]
    fn test_delay_saturates_on_overflow() {
        // The factor fits in u32 but the product does not fit in a Duration
        let policy = RetryPolicy::new(3, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(u64::MAX - 1));
        assert_eq!(policy.delay_for(2), Duration::MAX);
        assert_eq!(policy.delay_for(32), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let result: Result<&str, String> = with_retry(&RetryPolicy::default(), "flaky", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("connection reset".to_string())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_after_ceiling() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), "down", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {}", n))
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No wait after the final attempt
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), String> = with_retry_if(
            &RetryPolicy::default(),
            "validate",
            |e: &String| e.starts_with("transient"),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("invalid input".to_string())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(0, Duration::ZERO);

        let result: Result<u32, String> = with_retry(&policy, "once", move || async move {
            Ok(counter.fetch_add(1, Ordering::SeqCst))
        })
        .await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
