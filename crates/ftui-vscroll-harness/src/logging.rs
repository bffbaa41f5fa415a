#![forbid(unsafe_code)]

//! Test logging setup.

use tracing_subscriber::EnvFilter;

/// Env var holding the filter directive for harness logs.
pub const LOG_ENV: &str = "FTUI_VSCROLL_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Install a test-writer subscriber filtered by `FTUI_VSCROLL_LOG`
/// (e.g. `ftui_vscroll=debug`). Safe to call from every test.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
