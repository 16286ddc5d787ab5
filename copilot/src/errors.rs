//! Error taxonomy for copilot pipeline runs.
//!
//! Every failure that can escape a pipeline maps to one of the variants
//! below and carries a stable error code suitable for surfacing across a
//! service boundary. The facade wraps errors into [`RequestError`] so the
//! originating request id always travels with them.

use thiserror::Error;
use uuid::Uuid;

/// Stable code for precondition failures (4xx-equivalent).
pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";
/// Stable code for routing misconfiguration.
pub const ROUTING_ERROR: &str = "ROUTING_ERROR";
/// Stable code for a detected execution cycle.
pub const CYCLE_DETECTED: &str = "CYCLE_DETECTED";
/// Stable code for external dependency failures.
pub const INTEGRATION_ERROR: &str = "INTEGRATION_ERROR";
/// Stable code for wrapped unclassified failures.
pub const UNEXPECTED_ERROR: &str = "UNEXPECTED_ERROR";
/// Stable code for document-store fetch failures.
pub const DOCUMENT_FETCH_ERROR: &str = "DOCUMENT_FETCH_ERROR";
/// Stable code for fast-fails while a breaker is open.
pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";
/// Stable code for scheduling text that cannot be parsed.
pub const SCHEDULING_PARSE_ERROR: &str = "SCHEDULING_PARSE_ERROR";

/// The error type shared by the engine, the steps, and the resilience layer.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A step's declared required fields were absent from the state.
    #[error("step '{step}' precondition failed: missing {}", missing.join(", "))]
    Precondition {
        /// The step whose requirements were not met.
        step: String,
        /// The missing field names.
        missing: Vec<String>,
    },

    /// No route matched after a step, or a named step does not exist.
    ///
    /// Indicates a programming error in graph construction, never expected
    /// from production traffic.
    #[error("routing failed at step '{step}': {reason}")]
    Routing {
        /// The step at which routing failed.
        step: String,
        /// What went wrong.
        reason: String,
    },

    /// A step was about to execute twice within one run.
    #[error("cycle detected at step '{step}': {}", path.join(" -> "))]
    CycleDetected {
        /// The step that would have re-executed.
        step: String,
        /// The execution path up to and including the repeated step.
        path: Vec<String>,
    },

    /// An external dependency call failed.
    #[error("{dependency} call failed after {attempts} attempt(s): {detail}")]
    Integration {
        /// The dependency name (breaker key).
        dependency: String,
        /// Stable error code.
        code: String,
        /// Whether the failure is worth retrying.
        transient: bool,
        /// How many attempts were made before giving up.
        attempts: u32,
        /// Human-readable detail.
        detail: String,
    },

    /// The circuit breaker for a dependency is open; the call was not made.
    #[error("circuit open for '{dependency}', failing fast")]
    CircuitOpen {
        /// The dependency name.
        dependency: String,
    },

    /// Scheduling text could not be parsed and the fallback was disabled.
    #[error("could not parse scheduling information: {reason}")]
    SchedulingParse {
        /// Why parsing failed.
        reason: String,
    },
}

impl Error {
    /// Creates a transient integration error for a dependency.
    #[must_use]
    pub fn integration(dependency: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Integration {
            dependency: dependency.into(),
            code: INTEGRATION_ERROR.to_string(),
            transient: true,
            attempts: 1,
            detail: detail.into(),
        }
    }

    /// Wraps an unclassified failure so implementation shapes never leak
    /// across the boundary.
    #[must_use]
    pub fn unexpected(dependency: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Integration {
            dependency: dependency.into(),
            code: UNEXPECTED_ERROR.to_string(),
            transient: false,
            attempts: 1,
            detail: detail.into(),
        }
    }

    /// Creates a document-fetch failure (non-transient by default; sources
    /// flag timeouts via [`Error::integration`] instead).
    #[must_use]
    pub fn document_fetch(document_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Integration {
            dependency: crate::clients::DOCUMENT_STORE.to_string(),
            code: DOCUMENT_FETCH_ERROR.to_string(),
            transient: false,
            attempts: 1,
            detail: format!("document '{}': {}", document_id.into(), detail.into()),
        }
    }

    /// Creates a precondition error listing the missing fields.
    #[must_use]
    pub fn precondition(step: impl Into<String>, missing: Vec<String>) -> Self {
        Self::Precondition {
            step: step.into(),
            missing,
        }
    }

    /// Returns the stable error code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Precondition { .. } => PRECONDITION_FAILED,
            Self::Routing { .. } => ROUTING_ERROR,
            Self::CycleDetected { .. } => CYCLE_DETECTED,
            Self::Integration { code, .. } => code,
            Self::CircuitOpen { .. } => CIRCUIT_OPEN,
            Self::SchedulingParse { .. } => SCHEDULING_PARSE_ERROR,
        }
    }

    /// Whether the resilience layer may retry this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Integration { transient: true, .. })
    }

    /// Whether this error should count against a circuit breaker.
    ///
    /// Validation and routing errors say nothing about dependency health.
    #[must_use]
    pub fn counts_against_breaker(&self) -> bool {
        matches!(self, Self::Integration { .. })
    }

    /// Records the number of attempts made before this error was returned.
    #[must_use]
    pub fn with_attempts(mut self, total_attempts: u32) -> Self {
        if let Self::Integration { attempts, .. } = &mut self {
            *attempts = total_attempts;
        }
        self
    }
}

/// An error bound to the request that produced it.
///
/// This is what facade operations return; the request id is the correlation
/// identifier logged alongside the failure.
#[derive(Debug, Error)]
#[error("request {request_id}: {error}")]
pub struct RequestError {
    /// The originating request id.
    pub request_id: Uuid,
    /// The underlying error.
    #[source]
    pub error: Error,
}

impl RequestError {
    /// Creates a request error, logging it with its correlation id first.
    #[must_use]
    pub fn new(request_id: Uuid, error: Error) -> Self {
        tracing::error!(
            request_id = %request_id,
            code = error.code(),
            error = %error,
            "request failed"
        );
        Self { request_id, error }
    }

    /// Returns the stable error code of the underlying error.
    #[must_use]
    pub fn code(&self) -> &str {
        self.error.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_lists_missing_fields() {
        let err = Error::precondition("retrieve", vec!["query".to_string()]);
        assert_eq!(err.code(), PRECONDITION_FAILED);
        assert!(err.to_string().contains("missing query"));
        assert!(!err.is_transient());
    }

    #[test]
    fn integration_attempts_are_recorded() {
        let err = Error::integration("generation-model", "timeout").with_attempts(4);
        assert!(err.to_string().contains("after 4 attempt(s)"));
        assert!(err.is_transient());
        assert!(err.counts_against_breaker());
    }

    #[test]
    fn unexpected_errors_are_not_retried() {
        let err = Error::unexpected("vector-store", "weird payload");
        assert_eq!(err.code(), UNEXPECTED_ERROR);
        assert!(!err.is_transient());
        assert!(err.counts_against_breaker());
    }

    #[test]
    fn circuit_open_is_not_transient() {
        let err = Error::CircuitOpen {
            dependency: "generation-model".to_string(),
        };
        assert_eq!(err.code(), CIRCUIT_OPEN);
        assert!(!err.is_transient());
        assert!(!err.counts_against_breaker());
    }

    #[test]
    fn request_error_carries_correlation_id() {
        let id = Uuid::new_v4();
        let err = RequestError::new(id, Error::integration("generation-model", "down"));
        assert_eq!(err.request_id, id);
        assert_eq!(err.code(), INTEGRATION_ERROR);
    }
}
