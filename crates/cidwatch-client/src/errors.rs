//! Errors that end a session.

use cidwatch_wire::WireError;
use thiserror::Error;

/// Why a session closed. Every variant is fatal to the connection and
/// triggers a reconnect.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The upgrade request could not be built from settings.
    #[error("invalid upgrade request: {context}")]
    Request {
        /// What was wrong.
        context: String,
    },

    /// Dialing or upgrading failed.
    #[error("connect to {url} failed: {reason}")]
    Connect {
        /// Endpoint dialed.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// Reading from the transport failed.
    #[error("transport read failed: {0}")]
    Read(String),

    /// Writing a control line failed.
    #[error("transport write failed: {0}")]
    Write(String),

    /// The remote end closed the connection.
    #[error("connection closed{}", close_suffix(.reason))]
    Closed {
        /// Close reason, when one was given.
        reason: Option<String>,
    },

    /// The server sent `-ERR`.
    #[error("server error: {0}")]
    Protocol(String),

    /// The byte stream could not be framed.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl ClientError {
    /// Whether the failure came from the protocol layer rather than the
    /// transport.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Wire(_))
    }
}

fn close_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

/// Convenience alias.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
