//! Settings types.
//!
//! Every section uses `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file only needs the keys it overrides.

mod dispatch;
mod stream;

pub use dispatch::{FetchStrategy, GatewaySettings, PinSettings, ValidationSettings};
pub use stream::{AuthSettings, StreamSettings, SubscriptionSettings};

use cidwatch_core::BackoffConfig;
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CidwatchSettings {
    /// Stream endpoint and WebSocket upgrade.
    pub stream: StreamSettings,
    /// `CONNECT` credentials.
    pub auth: AuthSettings,
    /// Pin collaborator.
    pub pin: PinSettings,
    /// Gateway fetch collaborator.
    pub gateway: GatewaySettings,
    /// Reconnect backoff bounds.
    pub reconnect: BackoffConfig,
    /// Opt-in message and `INFO` validation.
    pub validation: ValidationSettings,
    /// Log destinations.
    pub logging: LoggingSettings,
}

/// Log destinations and verbosity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Diagnostic level when `RUST_LOG` is unset.
    pub level: String,
    /// Event log file; `-` writes to stdout.
    pub event_log_path: String,
    /// Raw payload dump, disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_log_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            event_log_path: "pump.log".to_string(),
            raw_log_path: None,
        }
    }
}
