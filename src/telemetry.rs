//! Tracing subscriber installation.

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_filter` (for example
/// `info` or `image_relay=debug`) selects what is logged. Returns `false`
/// when a global subscriber was already installed, which is not an error.
#[must_use]
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
