//! Tracing setup for the coach binaries.
//!
//! Log lines always go to stderr; stdout is reserved for command output
//! (including `--json`).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither `--verbose` nor RUST_LOG is given
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber
///
/// `verbose` lowers the default filter to debug, which shows the engine's
/// intermediate values. RUST_LOG overrides either default.
pub fn init(verbose: bool) {
    init_with_level(if verbose { "debug" } else { DEFAULT_LEVEL })
}

/// Install the global subscriber with a specific default level
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Route logs through the test harness's captured output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
