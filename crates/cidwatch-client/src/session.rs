//! One connection attempt: handshake, keep-alive, delivery forwarding.
//!
//! ```text
//! AwaitingInfo ──INFO──▶ Handshaking ──CONNECT, SUB…, PING sent──▶ Subscribed
//!       │                                                             │
//!       └──────────── -ERR / framing error / transport error ─────────┴──▶ Closed
//! ```
//!
//! `PING` is answered with `PONG` in every state, before the next frame is
//! looked at. Deliveries are handed to the [`DeliveryHandler`] by value; the
//! handler must return without waiting on downstream work.

use std::convert::Infallible;
use std::sync::Arc;

use cidwatch_logging::{EventLog, LogEvent};
use cidwatch_settings::{CidwatchSettings, SubscriptionSettings};
use cidwatch_wire::{
    Auth, ClientCommand, ConnectOptions, DEFAULT_MAX_PAYLOAD_BYTES, Delivery, Frame, FrameReader,
};
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use crate::errors::{ClientError, Result};
use crate::transport::Transport;

/// Receives every delivery of a subscribed session.
///
/// Called on the read loop: implementations hand the work off (spawn) and
/// return immediately.
pub trait DeliveryHandler: Send + Sync {
    /// Take ownership of one delivery.
    fn on_delivery(&self, delivery: Delivery);
}

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for the server's first `INFO`.
    AwaitingInfo,
    /// `INFO` seen, handshake lines being written.
    Handshaking,
    /// Handshake and subscriptions sent; deliveries flow.
    Subscribed,
    /// Terminal.
    Closed,
}

/// Everything a session needs that does not change between attempts.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Handshake options, credentials included.
    pub connect: ConnectOptions,
    /// Subscriptions issued after the handshake.
    pub subscriptions: Vec<SubscriptionSettings>,
    /// Decoder payload ceiling.
    pub max_payload_bytes: usize,
    /// `INFO` keys that must be present; empty disables the check.
    pub required_info_keys: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect: ConnectOptions::default(),
            subscriptions: Vec::new(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            required_info_keys: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Derive from loaded settings.
    pub fn from_settings(settings: &CidwatchSettings) -> Self {
        let a = &settings.auth;
        let auth = Auth::select(
            a.user.clone(),
            a.pass.clone(),
            a.token.clone(),
            a.jwt.clone(),
            a.sig.clone(),
        );
        let required_info_keys = if settings.validation.enabled {
            settings.validation.require_info_keys.clone()
        } else {
            Vec::new()
        };
        Self {
            connect: ConnectOptions::new(auth),
            subscriptions: settings.stream.subscriptions.clone(),
            max_payload_bytes: settings.stream.max_payload_bytes,
            required_info_keys,
        }
    }
}

/// State of one connection attempt. Build a fresh one per attempt.
pub struct Session {
    config: Arc<SessionConfig>,
    handler: Arc<dyn DeliveryHandler>,
    events: EventLog,
    reader: FrameReader,
    state: SessionState,
    subscribed: bool,
}

impl Session {
    /// New session in [`SessionState::AwaitingInfo`].
    pub fn new(
        config: Arc<SessionConfig>,
        handler: Arc<dyn DeliveryHandler>,
        events: EventLog,
    ) -> Self {
        let reader = FrameReader::with_max_payload(config.max_payload_bytes);
        Self {
            config,
            handler,
            events,
            reader,
            state: SessionState::AwaitingInfo,
            subscribed: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether this session ever reached [`SessionState::Subscribed`].
    pub fn was_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Drive the connection until it fails. There is no clean exit: the
    /// returned error is why the session closed.
    pub async fn run<T: Transport + ?Sized>(&mut self, transport: &mut T) -> ClientError {
        let error = match self.drive(transport).await {
            Ok(never) => match never {},
            Err(error) => error,
        };
        self.state = SessionState::Closed;
        debug!(error = %error, subscribed = self.subscribed, "session closed");
        error
    }

    async fn drive<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Infallible> {
        loop {
            while let Some(frame) = self.reader.next_frame()? {
                self.handle_frame(frame, transport).await?;
            }
            let chunk = transport.recv().await?;
            trace!(bytes = chunk.len(), "received chunk");
            self.reader.extend(&chunk);
        }
    }

    async fn handle_frame<T: Transport + ?Sized>(
        &mut self,
        frame: Frame,
        transport: &mut T,
    ) -> Result<()> {
        match frame {
            Frame::Ping => send(transport, &ClientCommand::Pong).await,
            Frame::Pong => {
                trace!("PONG");
                Ok(())
            }
            Frame::ProtocolError(text) => {
                warn!(error = %text, state = ?self.state, "server error");
                Err(ClientError::Protocol(text))
            }
            Frame::ServerInfo(fields) => {
                if self.state == SessionState::AwaitingInfo {
                    self.handshake(&fields, transport).await
                } else {
                    debug!(keys = fields.len(), "INFO update");
                    Ok(())
                }
            }
            Frame::Delivery(delivery) => {
                if self.state == SessionState::Subscribed {
                    self.handler.on_delivery(delivery);
                } else {
                    warn!(subject = %delivery.subject, "delivery before subscribe, dropped");
                }
                Ok(())
            }
        }
    }

    async fn handshake<T: Transport + ?Sized>(
        &mut self,
        info: &Map<String, Value>,
        transport: &mut T,
    ) -> Result<()> {
        self.state = SessionState::Handshaking;
        self.record_server_info(info);

        let config = Arc::clone(&self.config);
        debug!(auth = config.connect.auth().kind(), "sending CONNECT");
        send(transport, &ClientCommand::Connect(config.connect.clone())).await?;
        for sub in &config.subscriptions {
            send(transport, &ClientCommand::sub(&sub.subject, &sub.sid)).await?;
        }
        send(transport, &ClientCommand::Ping).await?;

        self.state = SessionState::Subscribed;
        self.subscribed = true;
        let subjects: Vec<String> = config
            .subscriptions
            .iter()
            .map(|s| s.subject.clone())
            .collect();
        info!(subjects = ?subjects, "subscribed");
        self.events.record(LogEvent::Subscribed { subjects });
        Ok(())
    }

    fn record_server_info(&self, info: &Map<String, Value>) {
        let mut info_keys: Vec<String> = info.keys().cloned().collect();
        info_keys.sort();
        self.events.record(LogEvent::ServerInfo { info_keys });

        for key in &self.config.required_info_keys {
            if !info.contains_key(key) {
                self.events.record(LogEvent::ValidationError {
                    reason: "info_key_missing".to_string(),
                    subject: None,
                    key: Some(key.clone()),
                });
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("subscribed", &self.subscribed)
            .finish_non_exhaustive()
    }
}

async fn send<T: Transport + ?Sized>(transport: &mut T, command: &ClientCommand) -> Result<()> {
    trace!(verb = command.verb(), "send");
    transport.send_line(command.to_line()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_default_settings() {
        let config = SessionConfig::from_settings(&CidwatchSettings::default());
        assert_eq!(config.subscriptions.len(), 2);
        assert_eq!(config.connect.auth(), &Auth::None);
        assert!(config.required_info_keys.is_empty());
    }

    #[test]
    fn config_picks_jwt_and_info_keys() {
        let mut settings = CidwatchSettings::default();
        settings.auth.user = Some("u".into());
        settings.auth.jwt = Some("j".into());
        settings.validation.enabled = true;
        settings.validation.require_info_keys = vec!["server_id".into()];
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.connect.auth().kind(), "jwt");
        assert_eq!(config.required_info_keys, vec!["server_id"]);
    }

    #[test]
    fn info_keys_ignored_when_validation_off() {
        let mut settings = CidwatchSettings::default();
        settings.validation.require_info_keys = vec!["server_id".into()];
        assert!(SessionConfig::from_settings(&settings).required_info_keys.is_empty());
    }
}
