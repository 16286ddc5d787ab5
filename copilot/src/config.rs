//! Tunable configuration with production defaults.

use crate::clients::{DOCUMENT_STORE, EMBEDDING_MODEL, GENERATION_MODEL, VECTOR_STORE};
use crate::resilience::{BreakerConfig, BreakerRegistry, RetryPolicy};
use chrono::FixedOffset;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the copilot core.
///
/// Constructed once at startup and shared read-only; every tunable the
/// pipelines consult lives here so the heuristics can be adjusted without
/// touching step code.
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    /// Nearest neighbors fetched per retrieval.
    pub retrieval_k: usize,
    /// Characters of each chunk included in the generation context.
    pub context_excerpt_chars: usize,
    /// Characters of each chunk used as a citation snippet.
    pub citation_snippet_chars: usize,
    /// Minimum chunk length that counts as informative for scoring.
    pub min_informative_chars: usize,
    /// Confidence contributed per informative chunk.
    pub confidence_per_chunk: f64,
    /// Upper bound on retrieval-derived confidence.
    pub confidence_cap: f64,
    /// Below this confidence, reflection issues a quality-check call.
    pub reflect_threshold: f64,
    /// Below this confidence, a clarification request is appended.
    pub clarify_threshold: f64,
    /// Ingestion chunk size in characters.
    pub chunk_size: usize,
    /// Ingestion chunk overlap in characters.
    pub chunk_overlap: usize,
    /// Overall per-request deadline; retry backoff never exceeds it.
    pub request_timeout: Duration,
    /// Retry policy for transient dependency failures.
    pub retry: RetryPolicy,
    /// Per-dependency breaker overrides (falling back to `breaker_default`).
    pub breaker_overrides: HashMap<String, BreakerConfig>,
    /// Breaker config for dependencies without an override.
    pub breaker_default: BreakerConfig,
    /// Time zone used when resolving scheduling text.
    pub timezone: FixedOffset,
    /// When set, standalone scheduling parses fail instead of falling back
    /// to tomorrow 10:00 if no explicit day or time is present.
    pub require_explicit_time: bool,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        let mut breaker_overrides = HashMap::new();
        breaker_overrides.insert(
            GENERATION_MODEL.to_string(),
            BreakerConfig::new(3, Duration::from_secs(30)),
        );
        breaker_overrides.insert(
            EMBEDDING_MODEL.to_string(),
            BreakerConfig::new(3, Duration::from_secs(30)),
        );
        breaker_overrides.insert(
            DOCUMENT_STORE.to_string(),
            BreakerConfig::new(5, Duration::from_secs(60)),
        );
        breaker_overrides.insert(
            VECTOR_STORE.to_string(),
            BreakerConfig::new(5, Duration::from_secs(60)),
        );

        Self {
            retrieval_k: 5,
            context_excerpt_chars: 500,
            citation_snippet_chars: 200,
            min_informative_chars: 100,
            confidence_per_chunk: 0.2,
            confidence_cap: 0.9,
            reflect_threshold: 0.6,
            clarify_threshold: 0.3,
            chunk_size: 1000,
            chunk_overlap: 200,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker_overrides,
            breaker_default: BreakerConfig::default(),
            timezone: FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is valid")),
            require_explicit_time: false,
        }
    }
}

impl CopilotConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time zone used for scheduling resolution.
    #[must_use]
    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    /// Sets the per-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the process-scoped breaker registry from this config.
    #[must_use]
    pub fn breaker_registry(&self) -> BreakerRegistry {
        let mut registry = BreakerRegistry::new(self.breaker_default.clone());
        for (name, config) in &self.breaker_overrides {
            registry = registry.with_config(name.clone(), config.clone());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = CopilotConfig::default();
        assert_eq!(config.retrieval_k, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        let gen = &config.breaker_overrides[GENERATION_MODEL];
        assert_eq!(gen.threshold, 3);
        assert_eq!(gen.reset_timeout, Duration::from_secs(30));
        let docs = &config.breaker_overrides[DOCUMENT_STORE];
        assert_eq!(docs.threshold, 5);
        assert_eq!(docs.reset_timeout, Duration::from_secs(60));
    }

    #[test]
    fn registry_applies_overrides() {
        let config = CopilotConfig::default();
        let registry = config.breaker_registry();
        // Lazily created with the per-dependency override.
        let breaker = registry.get(GENERATION_MODEL);
        let _ = breaker;
    }
}
