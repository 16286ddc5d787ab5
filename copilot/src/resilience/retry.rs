//! Retry with deterministic exponential backoff.

use crate::errors::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied to the delay per retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the backoff factor.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Returns the backoff delay preceding retry number `attempt + 1`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        Duration::from_secs_f64(self.delay.as_secs_f64() * factor)
    }
}

/// Runs `op`, retrying transient failures with exponential backoff.
///
/// Only errors classified transient are retried; validation and routing
/// errors pass through untouched. When retries exhaust, the last transient
/// error is returned with the total attempt count recorded. A deadline, when
/// present, caps the backoff budget: a sleep that would overrun it is skipped
/// and the call gives up immediately.
pub async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    dependency: &str,
    deadline: Option<Instant>,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.backoff_for(attempt);
                if let Some(deadline) = deadline {
                    if Instant::now() + backoff >= deadline {
                        tracing::warn!(
                            dependency,
                            attempts = attempt + 1,
                            "deadline would elapse during backoff, giving up"
                        );
                        return Err(err.with_attempts(attempt + 1));
                    }
                }
                tracing::debug!(
                    dependency,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying transient failure"
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                return Err(err.with_attempts(attempt + 1));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn transient() -> Error {
        Error::integration("dep", "timeout")
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);

        let result: Result<i32, Error> = run(&policy, "dep", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sequence_is_one_two_four_seconds() {
        let policy = RetryPolicy::default();
        let times: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = times.clone();

        let result: Result<(), Error> = run(&policy, "dep", None, move || {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(Instant::now());
                Err(transient())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("after 4 attempt(s)"));

        let times = times.lock().unwrap();
        assert_eq!(times.len(), 4);
        let gaps: Vec<u64> = times.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();
        assert_eq!(gaps, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);

        let result: Result<(), Error> = run(&policy, "dep", None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::unexpected("dep", "bad payload")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_caps_the_backoff_budget() {
        let policy = RetryPolicy::default();
        let deadline = Instant::now() + Duration::from_millis(2500);
        let calls = AtomicUsize::new(0);

        let result: Result<(), Error> = run(&policy, "dep", Some(deadline), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        // Attempt 1 at t=0, retry after 1s, attempt 2 at t=1s; the next 2s
        // backoff would land past the deadline so the call gives up.
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<i32, Error> = run(&policy, "dep", None, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
