//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the process-wide JSON subscriber.
///
/// `RUST_LOG` overrides the filter; the default keeps engine crates at
/// info and quiets sqlx's per-query logging. Calling this again is a
/// no-op.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
