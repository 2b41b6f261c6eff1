//! Tracing subscriber setup
//!
//! The engine itself only emits `tracing` events; binaries and tests that
//! embed it call this once to get a subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize a global subscriber with env-filter support (`RUST_LOG`).
/// Safe to call more than once; later calls are no-ops.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // Already set by the host application; that subscriber wins.
    let _ = result;
}
