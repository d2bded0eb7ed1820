//! Structured logging initialization via `tracing`.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, or `default` when it is unset or invalid.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize the tracing subscriber with sensible defaults.
///
/// Respects the `RUST_LOG` environment variable for filtering and falls
/// back to `info` when it is unset. Calling it twice is harmless, which
/// makes it safe to call at the top of every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .with_test_writer()
        .try_init();
}
