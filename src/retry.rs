//! Retry policy and combinator shared by all external calls.
//!
//! Every HTTP integration in the pipeline (catalog, Wikipedia, PDF host, embedding
//! provider, vector index) retries transient failures through the single
//! [`with_retry`] combinator rather than per-call-site loops. Errors opt into
//! retrying by implementing [`Retryable`]; permanent failures short-circuit on the
//! first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Classification hook consumed by [`with_retry`].
pub trait Retryable {
    /// Whether the error is worth retrying (network failure, 5xx, timeout, rate limit).
    fn is_transient(&self) -> bool;
}

/// Exponential backoff parameters applied between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub factor: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fractional jitter applied symmetrically (0.2 ⇒ ±20 %).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy used for upsert batches (tighter attempt budget, same curve).
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Compute the backoff delay preceding `attempt` (1-based, so `attempt = 1`
    /// is the delay after the first failure).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.base_delay.as_secs_f64() * self.factor.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let jittered = if self.jitter > 0.0 {
            let spread = rand::rng().random_range(-self.jitter..=self.jitter);
            (capped * (1.0 + spread)).max(0.0)
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }
}

/// Run `op`, retrying transient failures under `policy`.
///
/// The `operation` label is attached to every retry log record so a single logical
/// call can be traced through its attempts. After the attempt budget is exhausted the
/// final error is returned unchanged; callers treat it as permanent for the current
/// operation.
pub async fn with_retry<T, E, F, Fut>(operation: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure; backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                if attempt > 1 {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "Retry budget exhausted"
                    );
                }
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient={})", self.transient)
        }
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(4),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = with_retry("op", fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.expect("eventual success"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_short_circuit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = with_retry("op", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { transient: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = with_retry("op", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { transient: true }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn delays_grow_and_respect_the_cap() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let first = policy.delay_for_attempt(1);
        let second = policy.delay_for_attempt(2);
        let deep = policy.delay_for_attempt(12);

        assert_eq!(first, Duration::from_millis(500));
        assert_eq!(second, Duration::from_millis(1000));
        assert_eq!(deep, Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_the_band() {
        let policy = RetryPolicy::default();
        for _ in 0..64 {
            let delay = policy.delay_for_attempt(1).as_secs_f64();
            assert!(delay >= 0.4 - f64::EPSILON && delay <= 0.6 + f64::EPSILON);
        }
    }
}
