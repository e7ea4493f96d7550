//! Logging bootstrap.
//!
//! The crate logs through `tracing`; applications that do not install
//! their own subscriber can call [`init`] once at startup. The filter is
//! taken from `RUST_LOG` when set, defaulting to `info`.

use tracing_subscriber::EnvFilter;

/// Installs the default log subscriber, ignoring failure if one is
/// already installed.
pub fn init() {
    let _ = try_init();
}

/// Installs the default log subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()?;
    Ok(())
}
