//! Tracing initialization.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initializes the tracing subscriber for a host process.
///
/// Reads the `COPILOT_LOG` environment variable for per-module log levels
/// (e.g. `COPILOT_LOG=copilot=debug`), falling back to `copilot=info`.
/// Idempotent; repeated calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("COPILOT_LOG").unwrap_or_else(|_| EnvFilter::new("copilot=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    });
}

/// Like [`init_tracing`], but emits JSON lines for log shippers.
pub fn init_json_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("COPILOT_LOG").unwrap_or_else(|_| EnvFilter::new("copilot=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter)
            .init();
    });
}
