//! Reconnect loop.
//!
//! Each attempt builds a fresh [`Session`] over a fresh transport. When an
//! attempt ends, the delay is read from the [`Backoff`], a `reconnect` record
//! is written, the loop sleeps, and the delay doubles toward its ceiling. A
//! session that reached `Subscribed` resets the backoff first, so the failure
//! after a good run waits only the floor. There are no attempt limits.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use cidwatch_core::{Backoff, BackoffConfig};
use cidwatch_logging::{EventLog, LogEvent};
use tracing::{info, warn};

use crate::errors::ClientError;
use crate::session::{DeliveryHandler, Session, SessionConfig};
use crate::transport::Connector;

/// Keeps one session alive at a time, forever.
pub struct Supervisor<C: Connector> {
    connector: C,
    config: Arc<SessionConfig>,
    handler: Arc<dyn DeliveryHandler>,
    events: EventLog,
    backoff: Backoff,
}

impl<C: Connector> Supervisor<C> {
    /// Supervisor with the given backoff bounds.
    pub fn new(
        connector: C,
        config: SessionConfig,
        handler: Arc<dyn DeliveryHandler>,
        events: EventLog,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            connector,
            config: Arc::new(config),
            handler,
            events,
            backoff: Backoff::new(backoff),
        }
    }

    /// Run until the process exits.
    pub async fn run(mut self) -> Infallible {
        loop {
            let (error, subscribed) = self.attempt().await;
            let _ = self.recover(&error, subscribed).await;
        }
    }

    /// One connection attempt, from dial to close. Returns why it ended and
    /// whether it got as far as subscribing.
    pub async fn attempt(&mut self) -> (ClientError, bool) {
        info!(endpoint = %self.connector.endpoint(), "connecting");
        let mut transport = match self.connector.connect().await {
            Ok(transport) => transport,
            Err(error) => return (error, false),
        };
        let mut session = Session::new(
            Arc::clone(&self.config),
            Arc::clone(&self.handler),
            self.events.clone(),
        );
        let error = session.run(&mut transport).await;
        (error, session.was_subscribed())
    }

    /// Log the failure, sleep the current delay, then grow it. Returns the
    /// delay slept.
    pub async fn recover(&mut self, error: &ClientError, subscribed: bool) -> Duration {
        if subscribed {
            self.backoff.reset();
        }
        let delay = self.backoff.current();
        let attempt = self.backoff.attempt();
        let backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        warn!(
            error = %error,
            protocol = error.is_protocol(),
            backoff_ms,
            attempt,
            "session ended, reconnecting"
        );
        self.events.record(LogEvent::Reconnect {
            error: error.to_string(),
            backoff_s: delay.as_secs(),
            backoff_ms,
            attempt,
        });

        tokio::time::sleep(delay).await;
        self.backoff.advance();
        delay
    }

    /// Delay the next failure would wait, ignoring any reset.
    pub fn current_delay(&self) -> Duration {
        self.backoff.current()
    }
}

impl<C: Connector + std::fmt::Debug> std::fmt::Debug for Supervisor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("connector", &self.connector)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
