//! # cidwatch-logging
//!
//! Two output channels:
//!
//! - **Diagnostics** through `tracing`, set up once with [`init_subscriber`]
//! - **The event log** ([`EventLog`]): an append-only sink of timestamped JSON
//!   lines shared by the session and every concurrent dispatch task
//!
//! plus an optional [`RawLog`] that dumps message payloads verbatim.

#![deny(unsafe_code)]

pub mod errors;
pub mod event_log;
pub mod events;

pub use errors::LogError;
pub use event_log::{EventLog, MemoryLog, RawLog, now_ts_ms};
pub use events::LogEvent;

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Minimum level to display when `RUST_LOG` is unset.
/// * `json` - Emit one JSON object per line instead of the compact format.
pub fn init_subscriber(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init is a no-op if a global subscriber is already set
    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
