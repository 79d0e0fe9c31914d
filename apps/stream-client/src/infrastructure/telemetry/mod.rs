//! Telemetry
//!
//! Structured logging initialization for the watcher binary. Library
//! code only ever emits `tracing` events; subscribers are the
//! binary's concern.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info` for this crate. Safe to
/// call once per process; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,folio_stream_client=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
