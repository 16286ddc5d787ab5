//! Per-dependency circuit breakers.
//!
//! A breaker bounds latency under a sustained outage: after `threshold`
//! consecutive failures it opens and every call fails fast with
//! [`Error::CircuitOpen`] until `reset_timeout` elapses, at which point one
//! probe call is allowed through (half-open). Failure counters are advisory,
//! never correctness-critical, so a coarse per-dependency lock suffices.

use crate::errors::Error;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls fail fast without contacting the dependency.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

/// Per-dependency breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub threshold: u32,
    /// How long the breaker stays open before allowing a probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// Creates a config with the given threshold and reset timeout.
    #[must_use]
    pub fn new(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            threshold,
            reset_timeout,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
}

/// A circuit breaker guarding one external dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for the named dependency.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Returns the current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Runs `op` under breaker protection.
    ///
    /// The operation passed here should already encapsulate its own retry
    /// cycle; this breaker records exactly one success or failure per call.
    /// Errors that say nothing about dependency health (preconditions,
    /// routing) pass through without touching the counters.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        {
            let mut inner = self.inner.lock();
            if inner.state == BreakerState::Open {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!(dependency = %self.name, "breaker half-open, probing");
                } else {
                    return Err(Error::CircuitOpen {
                        dependency: self.name.clone(),
                    });
                }
            }
        }

        let result = op().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(err) if err.counts_against_breaker() => self.record_failure(),
            Err(_) => {}
        }
        result
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!(dependency = %self.name, "breaker closed after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        if inner.state == BreakerState::HalfOpen || inner.failure_count >= self.config.threshold {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(
                dependency = %self.name,
                failure_count = inner.failure_count,
                "breaker opened"
            );
        }
    }
}

/// Process-scoped registry of breakers, keyed by dependency name.
///
/// Breakers are created lazily on first use and live for the process
/// lifetime; this is the one piece of process-wide mutable state in the
/// crate.
pub struct BreakerRegistry {
    default: BreakerConfig,
    configs: HashMap<String, BreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Creates a registry with a default config for unnamed dependencies.
    #[must_use]
    pub fn new(default: BreakerConfig) -> Self {
        Self {
            default,
            configs: HashMap::new(),
            breakers: DashMap::new(),
        }
    }

    /// Registers a per-dependency config override.
    #[must_use]
    pub fn with_config(mut self, dependency: impl Into<String>, config: BreakerConfig) -> Self {
        self.configs.insert(dependency.into(), config);
        self
    }

    /// Returns the breaker for a dependency, creating it on first use.
    #[must_use]
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                let config = self
                    .configs
                    .get(dependency)
                    .cloned()
                    .unwrap_or_else(|| self.default.clone());
                Arc::new(CircuitBreaker::new(dependency, config))
            })
            .clone()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
