//! Decoded inbound frames.

use bytes::Bytes;
use serde_json::{Map, Value};

/// One decoded unit of the wire protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// `INFO <json>`. Fields are empty when the JSON did not decode to an
    /// object.
    ServerInfo(Map<String, Value>),
    /// `PING`; the caller must answer with `PONG`.
    Ping,
    /// `PONG`; informational.
    Pong,
    /// `-ERR <text>`, fatal to the connection.
    ProtocolError(String),
    /// `MSG` or `HMSG` with its payload.
    Delivery(Delivery),
}

impl Frame {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServerInfo(_) => "INFO",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::ProtocolError(_) => "-ERR",
            Self::Delivery(d) if d.header_len.is_some() => "HMSG",
            Self::Delivery(_) => "MSG",
        }
    }
}

/// A message delivered on a subscription.
///
/// Owns its payload, so it can be handed off without any reference back to
/// the connection that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Subject the message was published to.
    pub subject: String,
    /// Subscription id the server matched.
    pub sid: String,
    /// Header section length; present only for `HMSG`.
    pub header_len: Option<usize>,
    /// Header bytes (if any) followed by the body.
    pub payload: Bytes,
}

impl Delivery {
    /// Plain `MSG` delivery.
    pub fn new(subject: impl Into<String>, sid: impl Into<String>, payload: Bytes) -> Self {
        Self {
            subject: subject.into(),
            sid: sid.into(),
            header_len: None,
            payload,
        }
    }

    /// The body: the payload after the header section.
    pub fn body(&self) -> Bytes {
        let start = self.header_len.unwrap_or(0).min(self.payload.len());
        self.payload.slice(start..)
    }

    /// The opaque header section, if this was an `HMSG`.
    pub fn headers(&self) -> Option<Bytes> {
        self.header_len
            .map(|len| self.payload.slice(..len.min(self.payload.len())))
    }
}
