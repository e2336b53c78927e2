//! The byte pipe under a session.
//!
//! [`Transport`] is the seam the session is written against; tests drive
//! sessions with a scripted in-memory implementation. [`WsTransport`] is the
//! production one: a `tokio-tungstenite` client speaking the `nats`
//! subprotocol with browser-like upgrade headers.

use async_trait::async_trait;
use bytes::Bytes;
use cidwatch_settings::StreamSettings;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, info, trace};

use crate::errors::{ClientError, Result};

/// A connected, bidirectional byte pipe.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next chunk of protocol bytes. Chunk boundaries carry no
    /// meaning.
    async fn recv(&mut self) -> Result<Bytes>;

    /// Write one control line (terminator included) immediately.
    async fn send_line(&mut self, line: String) -> Result<()>;
}

/// Opens fresh transports; one call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport produced by [`Connector::connect`].
    type Transport: Transport;

    /// Dial and upgrade.
    async fn connect(&self) -> Result<Self::Transport>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds WebSocket connections from [`StreamSettings`].
#[derive(Clone, Debug)]
pub struct WsConnector {
    settings: StreamSettings,
}

impl WsConnector {
    /// Connector for the configured endpoint.
    pub fn new(settings: StreamSettings) -> Self {
        Self { settings }
    }

    /// The upgrade request with every configured header applied.
    pub fn build_request(&self) -> Result<Request> {
        let s = &self.settings;
        let mut request =
            s.url
                .as_str()
                .into_client_request()
                .map_err(|e| ClientError::Request {
                    context: format!("{}: {e}", s.url),
                })?;

        let mut headers = vec![
            ("Sec-WebSocket-Protocol", s.subprotocol.clone()),
            ("Origin", s.origin.clone()),
            ("User-Agent", s.user_agent.clone()),
            ("Sec-WebSocket-Key", s.websocket_key.clone()),
            ("Pragma", "no-cache".to_string()),
            ("Cache-Control", "no-cache".to_string()),
        ];
        if let Some(bearer) = &s.bearer {
            headers.push(("Authorization", format!("Bearer {bearer}")));
        }

        for (name, value) in headers {
            let value = HeaderValue::from_str(&value).map_err(|e| ClientError::Request {
                context: format!("header {name}: {e}"),
            })?;
            let _ = request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    /// Frame and message ceilings for the socket.
    pub fn config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_frame_size = Some(self.settings.max_frame_bytes);
        config.max_message_size = Some(self.settings.max_frame_bytes);
        config
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self) -> Result<WsTransport> {
        let request = self.build_request()?;
        debug!(url = %self.settings.url, "dialing");
        let (stream, response) = connect_async_with_config(request, Some(self.config()), true)
            .await
            .map_err(|e| ClientError::Connect {
                url: self.settings.url.clone(),
                reason: e.to_string(),
            })?;
        info!(
            url = %self.settings.url,
            status = response.status().as_u16(),
            "websocket connected"
        );
        Ok(WsTransport::new(stream))
    }

    fn endpoint(&self) -> String {
        self.settings.url.clone()
    }
}

/// A connected WebSocket.
///
/// Text and binary messages are both treated as protocol bytes. WebSocket
/// pings are left to the library; liveness is the protocol's `PING`/`PONG`.
pub struct WsTransport {
    stream: WsStream,
}

impl WsTransport {
    /// Wrap an upgraded stream.
    pub fn new(stream: WsStream) -> Self {
        Self { stream }
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Bytes> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!("websocket control frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(ClientError::Closed {
                        reason: frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty()),
                    });
                }
                Some(Err(e)) => return Err(ClientError::Read(e.to_string())),
                None => return Err(ClientError::Closed { reason: None }),
            }
        }
    }

    async fn send_line(&mut self, line: String) -> Result<()> {
        self.stream
            .send(Message::text(line))
            .await
            .map_err(|e| ClientError::Write(e.to_string()))
    }
}
