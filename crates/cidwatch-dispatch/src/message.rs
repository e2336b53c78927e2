//! Turning a delivery into log records and dispatched work.

use std::sync::Arc;

use cidwatch_client::DeliveryHandler;
use cidwatch_core::MessageBody;
use cidwatch_logging::{EventLog, LogEvent, RawLog};
use cidwatch_settings::CidwatchSettings;
use cidwatch_wire::Delivery;
use serde_json::Value;
use tracing::trace;

use crate::collaborators::{PinataClient, ReqwestGatewayFetcher};
use crate::fanout::{DispatchTicket, Dispatcher};
use crate::preview;
use crate::validation::Validator;

/// Characters of an undecodable body kept in the log.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Decodes message bodies, records them, and dispatches their identifiers.
///
/// Body problems are logged and absorbed; nothing here can end a session.
#[derive(Debug)]
pub struct MessageHandler {
    dispatcher: Arc<Dispatcher>,
    validator: Validator,
    events: EventLog,
    raw: RawLog,
}

impl MessageHandler {
    /// Handler over an existing dispatcher.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        validator: Validator,
        events: EventLog,
        raw: RawLog,
    ) -> Self {
        Self {
            dispatcher,
            validator,
            events,
            raw,
        }
    }

    /// Handler with HTTP collaborators built from settings.
    pub fn from_settings(settings: &CidwatchSettings, events: EventLog, raw: RawLog) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(PinataClient::new(settings.pin.endpoint.clone())),
            Arc::new(ReqwestGatewayFetcher::new(settings.gateway.max_bytes)),
            settings.pin.clone(),
            settings.gateway.clone(),
            events.clone(),
        );
        Self::new(
            Arc::new(dispatcher),
            Validator::new(settings.validation.clone()),
            events,
            raw,
        )
    }

    /// Process one delivery; returns the work it started.
    pub fn handle(&self, delivery: &Delivery) -> DispatchTicket {
        let subject = delivery.subject.as_str();
        let body = delivery.body();
        self.raw.record(subject, &body);

        let text = unwrap_quoted(&String::from_utf8_lossy(&body));
        let object = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                self.events.record(LogEvent::MessageNonObject {
                    subject: subject.to_string(),
                });
                return DispatchTicket::default();
            }
            Err(e) => {
                self.events.record(LogEvent::MessageDecodeError {
                    subject: subject.to_string(),
                    error: e.to_string(),
                    payload_preview: preview(&text, PAYLOAD_PREVIEW_CHARS),
                });
                return DispatchTicket::default();
            }
        };

        let message = MessageBody::from_object(&object);
        let cids = message.identifiers();
        trace!(subject, cids = cids.len(), "message");
        self.events.record(LogEvent::Message {
            subject: subject.to_string(),
            mint: message.mint.clone().unwrap_or(Value::Null),
            image: message.image.clone().unwrap_or(Value::Null),
            cids: cids.clone(),
        });

        for violation in self.validator.check(subject, &message) {
            self.events.record(LogEvent::ValidationError {
                reason: violation.reason().to_string(),
                subject: Some(subject.to_string()),
                key: None,
            });
        }

        self.dispatcher.dispatch(subject, &cids)
    }
}

impl DeliveryHandler for MessageHandler {
    fn on_delivery(&self, delivery: Delivery) {
        // detached; outcomes surface in the event log
        drop(self.handle(&delivery));
    }
}

/// A body that is itself a JSON string literal is decoded once.
fn unwrap_quoted(text: &str) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        if let Ok(inner) = serde_json::from_str::<String>(text) {
            return inner;
        }
    }
    text.to_string()
}
