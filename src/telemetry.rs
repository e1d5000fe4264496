//! Tracing subscriber setup for binaries and tests that embed the services.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,item_hierarchy=debug";

/// Install a fmt subscriber driven by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored when a global
/// subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
