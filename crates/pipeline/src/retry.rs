//! Retry with exponential backoff.
//!
//! ## Algorithm
//! 1. Call the operation
//! 2. On failure, classify it
//! 3. Non-retryable failures are returned as they are
//! 4. Retryable failures sleep `base_delay * 2^(attempt-1)` and try again,
//!    at most `max_retries` times after the first call
//! 5. When the budget is spent, the last failure comes back wrapped in
//!    `MovieError::Exhausted`
//!
//! Every call to [`RetryPolicy::run`] keeps its own attempt counter, so one
//! key running out of retries never affects another.

use crate::classifier::classify;
use domain::MovieError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Which classified failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Only transient (network-like) failures
    #[default]
    Transient,
    /// Any failure, permanent ones included
    All,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every later one
    pub base_delay: Duration,
    /// Upper bound on a single delay
    pub max_delay: Option<Duration>,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
            retry_on: RetryOn::Transient,
        }
    }

    /// 3 retries starting at 500ms, transient failures only.
    pub fn exponential() -> Self {
        Self::new(3, Duration::from_millis(500))
    }

    /// Retry any failure straight away, without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO).with_retry_on(RetryOn::All)
    }

    /// Cap each individual delay (default: uncapped)
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Choose which failures are retried (default: transient only)
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Saturates at `Duration::MAX` instead of overflowing, then applies
    /// `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = 2u32
            .checked_pow(attempt - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Whether a classified failure should be retried under this policy.
    pub fn should_retry(&self, error: &MovieError) -> bool {
        match (self.retry_on, error) {
            (_, MovieError::Exhausted { .. }) => false,
            (RetryOn::All, _) => true,
            (RetryOn::Transient, error) => error.is_transient(),
        }
    }

    /// Run `operation` until it succeeds or the policy gives up.
    ///
    /// `label` only shows up in logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, MovieError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut retries: u32 = 0;

        loop {
            let failure = match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        info!(operation = label, attempt = attempts(retries), "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(failure) => classify(&failure),
            };

            if !self.should_retry(&failure) {
                error!(operation = label, error = %failure, "Failed with non-retryable error");
                return Err(failure);
            }

            if retries >= self.max_retries {
                error!(
                    operation = label,
                    attempts = attempts(retries),
                    error = %failure,
                    "Failed after all retry attempts"
                );
                return Err(MovieError::exhausted(attempts(retries), failure));
            }

            retries += 1;
            let delay = self.backoff(retries);
            warn!(
                operation = label,
                attempt = retries,
                max_retries = self.max_retries,
                delay_ms = millis(delay),
                error = %failure,
                "Retrying after failure"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Calls made so far, counting the first one.
fn attempts(retries: u32) -> u32 {
    retries.saturating_add(1)
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use domain::UpstreamFailure;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn network() -> anyhow::Error {
        anyhow::Error::new(UpstreamFailure::Network("connection reset".to_string()))
    }

    fn service() -> anyhow::Error {
        anyhow::Error::new(UpstreamFailure::Service("bad request".to_string()))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::exponential();

        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_cap_and_saturation() {
        let capped = RetryPolicy::exponential().with_max_delay(Duration::from_millis(1500));
        assert_eq!(capped.backoff(3), Duration::from_millis(1500));

        // Would overflow both the factor and the Duration
        let uncapped = RetryPolicy::exponential();
        assert_eq!(uncapped.backoff(200), Duration::MAX);
    }

    #[test]
    fn test_attempt_count_and_delay_saturate() {
        assert_eq!(attempts(0), 1);
        assert_eq!(attempts(3), 4);
        assert_eq!(attempts(u32::MAX), u32::MAX);

        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_should_retry_filter() {
        let transient_only = RetryPolicy::exponential();
        let all = RetryPolicy::exponential().with_retry_on(RetryOn::All);
        let exhausted = MovieError::exhausted(4, MovieError::transient("x"));

        assert!(transient_only.should_retry(&MovieError::transient("x")));
        assert!(!transient_only.should_retry(&MovieError::permanent("x")));
        assert!(all.should_retry(&MovieError::permanent("x")));
        assert!(!all.should_retry(&exhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_does_not_wait() {
        let policy = RetryPolicy::exponential();
        let start = Instant::now();

        let value = policy.run("ok", || async { Ok(7) }).await;

        assert_eq!(value, Ok(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::exponential();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = policy
            .run("flaky", || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if call <= 2 { Err(network()) } else { Ok(call) } }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(start.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_retries() {
        let policy = RetryPolicy::exponential();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), MovieError> = policy
            .run("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(network()) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match &err {
            MovieError::Exhausted { attempts, last } => {
                assert_eq!(*attempts, 4);
                assert!(last.is_transient());
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(err.message(), "network failure: connection reset");
        // 500 + 1000 + 2000
        assert!(start.elapsed() >= Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_short_circuits() {
        let policy = RetryPolicy::exponential();
        let calls = AtomicU32::new(0);

        let result: Result<(), MovieError> = policy
            .run("rejected", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(service()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(MovieError::Permanent { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_all_retries_permanent() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10)).with_retry_on(RetryOn::All);
        let calls = AtomicU32::new(0);

        let result: Result<(), MovieError> = policy
            .run("any", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("untagged")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(MovieError::Exhausted { attempts: 3, last }) => {
                assert!(matches!(*last, MovieError::Permanent { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), MovieError> = policy
            .run("immediate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(service()) }
            })
            .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(500));
        let calls = AtomicU32::new(0);

        let result: Result<(), MovieError> = policy
            .run("once", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(network()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(MovieError::Exhausted { attempts: 1, .. })
        ));
    }
}
