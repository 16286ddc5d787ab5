//! Request correlation and per-run execution context.

use crate::errors::Error;
use crate::resilience::{BreakerRegistry, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Identity of one inbound call, created once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Opaque unique token used for correlation in errors and logs.
    pub request_id: Uuid,
    /// When the request entered the system.
    pub received_at: DateTime<Utc>,
}

impl RequestEnvelope {
    /// Creates an envelope with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }
}

impl Default for RequestEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a step needs besides the pipeline state: correlation identity,
/// the request deadline, and the resilience handles for external calls.
///
/// One context is built per inbound request and shared by every step of that
/// run; it never outlives the run.
#[derive(Clone)]
pub struct RunContext {
    envelope: RequestEnvelope,
    deadline: Option<Instant>,
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
}

impl RunContext {
    /// Creates a context for a fresh request.
    #[must_use]
    pub fn new(breakers: Arc<BreakerRegistry>, retry: RetryPolicy) -> Self {
        Self {
            envelope: RequestEnvelope::new(),
            deadline: None,
            breakers,
            retry,
        }
    }

    /// Caps the run at `timeout` from now; backoff sleeps respect this.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Returns the request envelope.
    #[must_use]
    pub fn envelope(&self) -> &RequestEnvelope {
        &self.envelope
    }

    /// Returns the correlation id for this run.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.envelope.request_id
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Routes an external call through `breaker.call(retry(op))`.
    ///
    /// This is the canonical path for every external call made from inside a
    /// step. The breaker sees the whole retry cycle as a single logical call:
    /// attempts within the cycle never increment its failure count, only the
    /// final exhausted failure does.
    pub async fn guarded_call<T, F, Fut>(&self, dependency: &str, op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send,
        T: Send,
    {
        let breaker = self.breakers.get(dependency);
        breaker
            .call(|| crate::resilience::retry(&self.retry, dependency, self.deadline, op))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BreakerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> RunContext {
        RunContext::new(Arc::new(BreakerRegistry::default()), RetryPolicy::default())
    }

    #[test]
    fn envelopes_get_unique_ids() {
        assert_ne!(RequestEnvelope::new().request_id, RequestEnvelope::new().request_id);
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_call_retries_then_succeeds() {
        let ctx = context();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<i32, Error> = ctx
            .guarded_call("generation-model", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::integration("generation-model", "timeout"))
                    } else {
                        Ok(5)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retry_cycle_counts_once_against_breaker() {
        let registry = Arc::new(
            BreakerRegistry::default()
                .with_config("generation-model", BreakerConfig::new(3, Duration::from_secs(30))),
        );
        let ctx = RunContext::new(registry.clone(), RetryPolicy::default());

        // Four attempts inside one guarded call: one logical breaker failure.
        let result: Result<(), Error> = ctx
            .guarded_call("generation-model", || async {
                Err(Error::integration("generation-model", "down"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(registry.get("generation-model").failure_count(), 1);
    }
}
