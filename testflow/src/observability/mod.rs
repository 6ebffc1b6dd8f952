//! Observability utilities.
//!
//! Installs the `tracing` subscriber configured by [`LoggingConfig`] and
//! builds the spans test runs are instrumented with.

use crate::config::LoggingConfig;
use crate::errors::TestflowError;
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Errors
///
/// Returns `Configuration` for an invalid filter directive, or if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TestflowError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| TestflowError::Configuration(format!("cannot install subscriber: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TestflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            TestflowError::Configuration(format!("invalid log level '{}': {e}", config.level))
        }),
    }
}

/// Creates the span a test case runs in.
#[must_use]
pub fn test_span(test: &str, run_id: Uuid) -> Span {
    tracing::info_span!("test", name = %test, run_id = %run_id)
}
