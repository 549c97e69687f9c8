//! Tracing bootstrap for binaries and tests embedding Quill.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Returns `false` if a subscriber
/// was already installed, so calling this more than once is harmless.
pub fn init_tracing(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
