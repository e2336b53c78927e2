//! Records of downstream actions taken for an identifier.

use serde::Serialize;
use serde_json::Value;

use crate::identifier::Identifier;

/// The kind of downstream action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Pin submission to the storage-pinning service.
    Pin,
    /// Timed GET against one gateway URL.
    GatewayFetch,
}

impl ActionKind {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pin => "pin",
            Self::GatewayFetch => "gateway_fetch",
        }
    }
}

/// Result of one action for one identifier.
///
/// Created when the action completes and written once to the event log.
/// `status` is the HTTP status, or `0` when no response was received.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// What was done.
    pub action: ActionKind,
    /// The identifier acted on.
    pub cid: Identifier,
    /// Subject of the message that carried the identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Endpoint or gateway URL the action targeted.
    pub target: String,
    /// HTTP status code (`0` for transport failures and timeouts).
    pub status: u16,
    /// Wall-clock duration of the collaborator call.
    pub elapsed_ms: u64,
    /// Bytes read from the response body.
    pub size_bytes: u64,
    /// `true` when `status` is 2xx.
    pub ok: bool,
    /// Failure description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Decoded JSON response body (pin only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl DispatchOutcome {
    /// Build an outcome; `ok` is derived from `status`.
    pub fn new(
        action: ActionKind,
        cid: Identifier,
        target: impl Into<String>,
        status: u16,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            action,
            cid,
            subject: None,
            target: target.into(),
            status,
            elapsed_ms,
            size_bytes: 0,
            ok: is_success(status),
            error: None,
            response: None,
        }
    }

    /// Attach the originating subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attach a byte count.
    #[must_use]
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Attach an error description.
    #[must_use]
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// Attach a response body.
    #[must_use]
    pub fn with_response(mut self, response: Option<Value>) -> Self {
        self.response = response;
        self
    }
}

/// 2xx check shared by every collaborator.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
