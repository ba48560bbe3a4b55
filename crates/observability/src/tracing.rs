//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize process-wide logging for services.
///
/// JSON lines with timestamps, filtered via `RUST_LOG` (default `info`).
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Plain-text variant for tests and local debugging.
///
/// Output goes through the test writer so it stays attached to the test
/// that produced it. Repeated calls are no-ops, so every test can call this
/// unconditionally.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
