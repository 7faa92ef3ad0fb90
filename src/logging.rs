//! Diagnostic logging setup.
//!
//! Every failure the feed swallows is reported through `tracing`; this
//! installs the fmt subscriber that prints those events.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over `filter`.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
