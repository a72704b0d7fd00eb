//! Tracing subscriber configuration.
//!
//! Log levels follow these conventions:
//! - ERROR: construction failures, unrecoverable engine errors
//! - WARN: best-effort steps that failed (port binds, log trims, state writes)
//! - INFO: lifecycle events, joins and leaves, engine trace messages
//! - DEBUG: config updates, path decisions, API requests

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::service_log::ServiceLog;

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize the subscriber: human-readable stdout plus the node's
/// service log.
///
/// Log level can be controlled via the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
pub fn init(service_log: &ServiceLog) {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(service_log.clone()),
        )
        .init();
}

/// Like [`init`], with JSON lines on stdout.
///
/// Activated by `--log-json` or `RUST_LOG_FORMAT=json`.
pub fn init_json(service_log: &ServiceLog) {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(tracing_subscriber::fmt::layer().json())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(service_log.clone()),
        )
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` to avoid panicking if called multiple times.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}
