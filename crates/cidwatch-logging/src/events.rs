//! The closed set of event-log records.
//!
//! Serialized internally tagged: `{"event": "<name>", ...fields}`.

use cidwatch_core::{DispatchOutcome, Identifier};
use serde::Serialize;
use serde_json::Value;

/// One event-log record (timestamp is added by the sink).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// Effective configuration at process start.
    StartupConfig {
        /// Non-secret settings summary.
        config: Value,
    },
    /// First `INFO` of a connection.
    ServerInfo {
        /// Sorted keys of the `INFO` object.
        info_keys: Vec<String>,
    },
    /// Handshake finished and subscriptions issued.
    Subscribed {
        /// Subjects subscribed to.
        subjects: Vec<String>,
    },
    /// A message body decoded to an object.
    Message {
        /// Subject the message arrived on.
        subject: String,
        /// `mint` field or `null`.
        mint: Value,
        /// `image` field or `null`.
        image: Value,
        /// Identifiers extracted for dispatch.
        cids: Vec<Identifier>,
    },
    /// A message body decoded to JSON that is not an object.
    MessageNonObject {
        /// Subject the message arrived on.
        subject: String,
    },
    /// A message body that is not JSON.
    MessageDecodeError {
        /// Subject the message arrived on.
        subject: String,
        /// Decoder error text.
        error: String,
        /// First 200 characters of the body.
        payload_preview: String,
    },
    /// An opt-in validation rule failed.
    ValidationError {
        /// Which rule failed.
        reason: String,
        /// Subject, for message-level rules.
        #[serde(skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
        /// Missing key, for `INFO` rules.
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
    /// Pin not attempted.
    PinSkipped {
        /// Identifier that was not pinned.
        cid: Identifier,
        /// Subject of the carrying message.
        subject: String,
        /// Why it was skipped.
        reason: String,
    },
    /// One completed downstream action.
    Dispatch(DispatchOutcome),
    /// Summary of a local-first fetch race.
    SmartFetch {
        /// Identifier fetched.
        cid: Identifier,
        /// Subject of the carrying message.
        subject: String,
        /// How the race was decided.
        strategy: String,
        /// Winning gateway, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        gateway: Option<String>,
        /// Bytes read by the winner.
        size_bytes: u64,
        /// Time from start of the race to its decision.
        total_elapsed_ms: u64,
        /// Number of attempts that failed before the decision.
        failed_gateways: usize,
        /// `true` when some gateway succeeded.
        ok: bool,
    },
    /// A session ended; the supervisor is about to sleep and retry.
    Reconnect {
        /// Why the session ended.
        error: String,
        /// Upcoming delay in whole seconds.
        backoff_s: u64,
        /// Upcoming delay in milliseconds.
        backoff_ms: u64,
        /// Consecutive failures since the last successful subscribe.
        attempt: u32,
    },
}

impl LogEvent {
    /// The `event` discriminator value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartupConfig { .. } => "startup_config",
            Self::ServerInfo { .. } => "server_info",
            Self::Subscribed { .. } => "subscribed",
            Self::Message { .. } => "message",
            Self::MessageNonObject { .. } => "message_non_object",
            Self::MessageDecodeError { .. } => "message_decode_error",
            Self::ValidationError { .. } => "validation_error",
            Self::PinSkipped { .. } => "pin_skipped",
            Self::Dispatch(_) => "dispatch",
            Self::SmartFetch { .. } => "smart_fetch",
            Self::Reconnect { .. } => "reconnect",
        }
    }
}
