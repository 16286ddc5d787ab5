//! Resilience layer: retry-with-backoff and circuit breaking.
//!
//! Every external call made from inside a pipeline step goes through
//! `breaker.call(retry(op))` — the breaker treats a whole retry cycle as one
//! logical call, so individual attempts never increment the failure count;
//! only an exhausted cycle does.

mod breaker;
mod retry;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker};
pub use retry::{run as retry, RetryPolicy};
