//! Scripted transport and recording handler shared by the session and
//! supervisor tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use cidwatch_client::{ClientError, Connector, DeliveryHandler, Transport};
use cidwatch_wire::Delivery;

/// Interleaved record of what the session did, in order.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Lines the session sent, without terminators.
    pub fn sent(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("send:").map(str::to_owned))
            .collect()
    }
}

/// Replays canned chunks, then reports the connection closed.
pub struct ScriptedTransport {
    incoming: VecDeque<Bytes>,
    trace: Trace,
}

impl ScriptedTransport {
    pub fn new(chunks: &[&[u8]], trace: Trace) -> Self {
        Self {
            incoming: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            trace,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn recv(&mut self) -> Result<Bytes, ClientError> {
        match self.incoming.pop_front() {
            Some(chunk) => {
                self.trace.push("recv");
                Ok(chunk)
            }
            None => Err(ClientError::Closed { reason: None }),
        }
    }

    async fn send_line(&mut self, line: String) -> Result<(), ClientError> {
        assert!(line.ends_with("\r\n"), "unterminated line {line:?}");
        self.trace.push(format!("send:{}", line.trim_end()));
        Ok(())
    }
}

/// Hands out prepared connection results in order; fails once exhausted.
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    attempts: Arc<Mutex<VecDeque<Result<ScriptedTransport, ClientError>>>>,
    connects: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl ScriptedConnector {
    pub fn push_ok(&self, transport: ScriptedTransport) {
        self.attempts.lock().unwrap().push_back(Ok(transport));
    }

    pub fn push_err(&self, reason: &str) {
        self.attempts.lock().unwrap().push_back(Err(refused(reason)));
    }

    pub fn connect_times(&self) -> Vec<tokio::time::Instant> {
        self.connects.lock().unwrap().clone()
    }
}

pub fn refused(reason: &str) -> ClientError {
    ClientError::Connect {
        url: "scripted".into(),
        reason: reason.into(),
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport, ClientError> {
        self.connects.lock().unwrap().push(tokio::time::Instant::now());
        let next = self.attempts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(refused("connection refused")))
    }

    fn endpoint(&self) -> String {
        "scripted".into()
    }
}

/// Records deliveries into the trace and keeps them.
#[derive(Default)]
pub struct RecordingHandler {
    pub trace: Trace,
    pub deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingHandler {
    pub fn with_trace(trace: Trace) -> Arc<Self> {
        Arc::new(Self {
            trace,
            deliveries: Mutex::new(Vec::new()),
        })
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl DeliveryHandler for RecordingHandler {
    fn on_delivery(&self, delivery: Delivery) {
        self.trace.push(format!("deliver:{}", delivery.subject));
        self.deliveries.lock().unwrap().push(delivery);
    }
}
