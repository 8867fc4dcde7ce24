//! `turnstile-observability` — shared log setup.

/// Wire up structured logging for the process.
///
/// Safe to call from every entry point; repeated calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
