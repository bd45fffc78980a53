//! Bounded retry with exponential backoff.
//!
//! An operation is attempted at most `max_retries + 1` times. Between attempts
//! the retrier waits `min(initial_delay * 2^(attempt-1), max_delay)` on the
//! tokio timer. The first error the predicate rejects is returned unchanged,
//! as is the last error once attempts are exhausted.
//!
//! Example with initial_delay=1s, max_delay=30s:
//! - after attempt 1: 1s
//! - after attempt 2: 2s
//! - after attempt 3: 4s
//! - after attempt 6: 30s (capped)

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryOptions {
    /// Delay before the attempt following `attempt` (1-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1));
        factor
            .and_then(|f| self.initial_delay.checked_mul(f))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// State of one retry call, handed to the retry observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// The attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    /// How long the retrier sleeps before the next attempt.
    pub delay: Duration,
}

/// Retry `op` while the error reports itself retryable.
pub async fn retry<T, E, F, Fut>(op: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    retry_notify(op, options, |err: &E| err.is_retryable(), |_, _| {}).await
}

/// Retry `op` while `should_retry` accepts the error.
pub async fn retry_with<T, E, F, Fut, P>(op: F, options: &RetryOptions, should_retry: P) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    retry_notify(op, options, should_retry, |_, _| {}).await
}

/// Retry with a callback invoked before every backoff sleep.
///
/// `op` receives the 1-indexed attempt number.
pub async fn retry_notify<T, E, F, Fut, P, N>(
    mut op: F,
    options: &RetryOptions,
    should_retry: P,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    N: FnMut(&E, &RetryContext),
    E: std::fmt::Display,
{
    let max_attempts = options.max_attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                let ctx = RetryContext {
                    attempt,
                    max_attempts,
                    delay: options.backoff_delay(attempt),
                };
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = ctx.delay.as_millis() as u64,
                    error = %err,
                    "retryable failure, backing off"
                );
                on_retry(&err, &ctx);
                tokio::time::sleep(ctx.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct TestError {
        retryable: bool,
        n: u32,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error #{}", self.n)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_options(max_retries: u32) -> RetryOptions {
        RetryOptions {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_default_options() {
        let opts = RetryOptions::default();
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.initial_delay, Duration::from_secs(1));
        assert_eq!(opts.max_attempts(), 4);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let opts = RetryOptions {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(opts.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(opts.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(opts.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(opts.backoff_delay(4), Duration::from_secs(5));
        // exponent overflow falls back to the cap
        assert_eq!(opts.backoff_delay(64), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_always_retryable_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(TestError { retryable: true, n: attempt }) }
            },
            &fast_options(2),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // the last error surfaces
        assert_eq!(result.unwrap_err().n, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(TestError { retryable: false, n: attempt }) }
            },
            &fast_options(5),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err(), TestError { retryable: false, n: 1 });
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let result: Result<&str, TestError> = retry(
            |attempt| async move {
                if attempt < 3 {
                    Err(TestError { retryable: true, n: attempt })
                } else {
                    Ok("done")
                }
            },
            &fast_options(3),
        )
        .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(TestError { retryable: true, n: attempt }) }
            },
            &fast_options(0),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate_overrides_retryable() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = retry_with(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(TestError { retryable: false, n: attempt }) }
            },
            &fast_options(2),
            |_| true,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_on_tokio_timer() {
        let opts = RetryOptions {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        let mut observed = Vec::new();
        let start = tokio::time::Instant::now();

        let _: Result<(), TestError> = retry_notify(
            |attempt| async move { Err(TestError { retryable: true, n: attempt }) },
            &opts,
            |e: &TestError| e.is_retryable(),
            |_, ctx| observed.push((ctx.attempt, ctx.delay)),
        )
        .await;

        assert_eq!(
            observed,
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }
}
