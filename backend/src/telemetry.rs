//! Tracing subscriber set-up shared by the worker binaries.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`.
///
/// A second call (or a subscriber installed elsewhere) is reported as a
/// warning rather than an error.
pub fn init() {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        tracing::warn!(error = %e, "tracing init failed");
    }
}
