//! Stream connection settings.

use serde::{Deserialize, Serialize};

/// One subject filter and the subscription id bound to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Subject filter, wildcards allowed.
    pub subject: String,
    /// Locally chosen subscription id.
    pub sid: String,
}

impl SubscriptionSettings {
    /// Convenience constructor.
    pub fn new(subject: impl Into<String>, sid: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            sid: sid.into(),
        }
    }
}

/// Stream endpoint and WebSocket upgrade settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// `wss://` endpoint.
    pub url: String,
    /// `Sec-WebSocket-Protocol` token.
    pub subprotocol: String,
    /// `Origin` upgrade header.
    pub origin: String,
    /// `User-Agent` upgrade header.
    pub user_agent: String,
    /// Fixed `Sec-WebSocket-Key`.
    pub websocket_key: String,
    /// Optional `Authorization: Bearer` upgrade header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
    /// Largest WebSocket frame/message accepted.
    pub max_frame_bytes: usize,
    /// Largest `MSG`/`HMSG` payload the decoder accepts.
    pub max_payload_bytes: usize,
    /// Subscriptions issued after each handshake.
    pub subscriptions: Vec<SubscriptionSettings>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: "wss://prod-advanced.nats.realtime.pump.fun/".to_string(),
            subprotocol: "nats".to_string(),
            origin: "https://pump.fun".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36"
                .to_string(),
            websocket_key: "IgTbIuAbBcB0BmbCyLtDKA==".to_string(),
            bearer: None,
            max_frame_bytes: 20_000_000,
            max_payload_bytes: 64 * 1024 * 1024,
            subscriptions: vec![
                SubscriptionSettings::new("advancedNewCoinCreated", "4"),
                SubscriptionSettings::new("coinImageUpdated.>", "2"),
            ],
        }
    }
}

/// `CONNECT` credentials. All optional; see `cidwatch_wire::Auth` for
/// precedence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    /// Auth token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// User JWT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
    /// Nonce signature accompanying the JWT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}
