//! Tracing bootstrap shared by binaries and integration harnesses.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global JSON subscriber, filtered by `RUST_LOG`.
///
/// Initialisation failures are logged rather than propagated so a harness
/// that installs its own subscriber first keeps working.
pub fn init() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
}
