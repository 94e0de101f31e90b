//! Logging setup for host applications.
//!
//! The library only emits `tracing` events; it never installs a subscriber
//! on its own. Hosts that want console output call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` (e.g. `"trueno_studio=debug"`).
///
/// # Errors
/// Returns error if the filter is invalid or a global subscriber is already set.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| Error::Config(format!("invalid log filter {default_filter:?}: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Other(format!("tracing subscriber already installed: {e}")))
}
