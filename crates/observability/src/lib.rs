//! Shared logging setup for engine binaries and tests.

pub mod tracing;

/// Install the engine's JSON tracing subscriber. Idempotent.
pub fn init() {
    tracing::init();
}
