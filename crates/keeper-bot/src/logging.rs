//! Structured logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. When `RUST_ENV=production` the
/// output is JSON with span context for log shippers, otherwise a
/// human-readable format.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keeper=debug"));

    let production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    if production {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(false)
            .init();
    }
}
