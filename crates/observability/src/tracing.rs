//! Process-wide log setup for the door and bar tooling.
//!
//! Services emit structured `tracing` events (admissions, movements, sales);
//! this wires them to JSON on stdout so staff-facing hosts can ship them
//! as-is.

use tracing_subscriber::EnvFilter;

/// Initialize the JSON subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Repeated calls
/// are no-ops, so every entry point (and every test binary) can call this
/// unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
