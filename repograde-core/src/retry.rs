//! Pacing and retry primitives shared by the evaluator gateway and orchestrators.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use log::warn;

use crate::error::{RepoGradeError, Result};

/// Async sleep abstraction so pacing can be observed in tests.
pub trait Sleeper {
    /// Suspend for `duration`.
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Tokio-backed sleeper used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Retry settings with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: u32,
    /// Factor applied to the exponential term.
    pub multiplier: f64,
    /// Lower bound for a single wait.
    pub min_wait: Duration,
    /// Upper bound for a single wait.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 2.0,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.multiplier * 2f64.powi(exponent);
        let wait = Duration::from_secs_f64(secs.max(0.0));
        wait.clamp(self.min_wait, self.max_wait)
    }
}

/// Retry `action` while it fails with a retryable error and attempts remain.
///
/// Every attempt is preceded by `pacing`; failed attempts additionally wait
/// for the backoff delay. Non-retryable errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut, S>(
    policy: RetryPolicy,
    pacing: Duration,
    sleeper: &S,
    mut action: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    S: Sleeper + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if !pacing.is_zero() {
            sleeper.sleep(pacing).await;
        }
        match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!("attempt {attempt}/{max_attempts} failed ({err}); retrying in {delay:?}");
                sleeper.sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run `future` with a time budget, mapping expiry to [`RepoGradeError::Timeout`].
pub async fn with_timeout<T, Fut>(budget: Duration, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, future).await {
        Ok(result) => result,
        Err(_) => Err(RepoGradeError::Timeout(budget)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Sleeper that records requested durations without waiting.
    pub(crate) struct RecordingSleeper {
        durations: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn new() -> Self {
            Self {
                durations: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn durations(&self) -> Vec<Duration> {
            self.durations.lock().expect("durations").clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep<'a>(
            &'a self,
            duration: Duration,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async move {
                self.durations.lock().expect("durations").push(duration);
            })
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn backoff_is_exponential_and_clamped() {
        let policy = fast_policy();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(16));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn retries_rate_limits_until_attempts_exhausted() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_with_backoff(
            fast_policy(),
            Duration::from_secs(4),
            &sleeper,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RepoGradeError::RateLimited("429".to_string())) }
            },
        )
        .await;

        assert!(matches!(result, Err(RepoGradeError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.durations(),
            vec![
                Duration::from_secs(4),
                Duration::from_secs(4),
                Duration::from_secs(4),
                Duration::from_secs(4),
                Duration::from_secs(4),
            ]
        );
    }

    #[tokio::test]
    async fn does_not_retry_other_failures() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_with_backoff(fast_policy(), Duration::ZERO, &sleeper, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RepoGradeError::Upstream("502".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(RepoGradeError::Upstream(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.durations().is_empty());
    }

    #[tokio::test]
    async fn returns_first_success() {
        let sleeper = RecordingSleeper::new();

        let result = retry_with_backoff(fast_policy(), Duration::ZERO, &sleeper, |attempt| async move {
            if attempt < 2 {
                Err(RepoGradeError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(attempt)
            }
        })
        .await
        .expect("second attempt succeeds");

        assert_eq!(result, 2);
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn timeout_maps_to_retryable_error() {
        let result: Result<()> =
            with_timeout(Duration::from_millis(10), std::future::pending()).await;
        let err = result.unwrap_err();
        assert!(matches!(err, RepoGradeError::Timeout(_)));
        assert!(err.is_retryable());
    }
}
