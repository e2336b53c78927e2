//! WebSocket transport against a local server speaking the stream's side of
//! the protocol.

mod common;

use std::sync::{Arc, Mutex};

use cidwatch_client::{ClientError, Connector, SessionConfig, Supervisor, WsConnector};
use cidwatch_core::BackoffConfig;
use cidwatch_logging::EventLog;
use cidwatch_settings::{StreamSettings, SubscriptionSettings};
use common::{RecordingHandler, Trace};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

#[derive(Default, Clone)]
struct Seen {
    headers: Arc<Mutex<Vec<(String, String)>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl Seen {
    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }
}

/// Accept one client, send `INFO`, wait for its `PING`, then play `script`.
async fn serve_once(script: Vec<Message>) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let seen = Seen::default();
    let server_seen = seen.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let headers = server_seen.headers.clone();
        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let mut headers = headers.lock().unwrap();
            for (name, value) in req.headers() {
                headers.push((name.to_string(), value.to_str().unwrap_or("").to_string()));
            }
            let _ = resp
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("nats"));
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        ws.send(Message::text("INFO {\"server_id\":\"local\"}\r\n"))
            .await
            .unwrap();

        // CONNECT, SUB and PING may arrive in any message grouping
        let mut pending = String::new();
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => pending.push_str(text.as_str()),
                _ => return,
            }
            let done = pending.contains("PING\r\n");
            server_seen
                .lines
                .lock()
                .unwrap()
                .extend(pending.split("\r\n").filter(|l| !l.is_empty()).map(str::to_owned));
            pending.clear();
            if done {
                break;
            }
        }

        for message in script {
            if ws.send(message).await.is_err() {
                return;
            }
        }
        let _ = ws.close(None).await;
    });

    (url, seen)
}

fn settings(url: String) -> StreamSettings {
    StreamSettings {
        url,
        subscriptions: vec![SubscriptionSettings::new("advancedNewCoinCreated", "4")],
        ..StreamSettings::default()
    }
}

#[tokio::test]
async fn upgrade_headers_and_handshake() {
    let (url, seen) = serve_once(vec![]).await;
    let stream = settings(url);
    let connector = WsConnector::new(stream.clone());

    let (events, log) = EventLog::memory();
    let handler = RecordingHandler::with_trace(Trace::default());
    let config = SessionConfig {
        subscriptions: stream.subscriptions.clone(),
        ..SessionConfig::default()
    };
    let mut sup = Supervisor::new(connector, config, handler, events, BackoffConfig::default());
    let (error, subscribed) = sup.attempt().await;

    assert!(subscribed);
    assert!(matches!(error, ClientError::Closed { .. }), "{error}");
    assert_eq!(seen.header("origin").as_deref(), Some("https://pump.fun"));
    assert_eq!(seen.header("sec-websocket-protocol").as_deref(), Some("nats"));
    assert_eq!(
        seen.header("sec-websocket-key").as_deref(),
        Some("IgTbIuAbBcB0BmbCyLtDKA==")
    );

    let lines = seen.lines.lock().unwrap().clone();
    assert!(lines[0].starts_with("CONNECT "));
    assert_eq!(lines[1], "SUB advancedNewCoinCreated 4");
    assert_eq!(lines[2], "PING");
    assert_eq!(log.events("server_info")[0]["info_keys"], serde_json::json!(["server_id"]));
}

#[tokio::test]
async fn message_split_across_frames_then_err() {
    let (url, _seen) = serve_once(vec![
        Message::text("PING\r\nMSG subj 4 13\r\n{\"cid\""),
        Message::binary(b":\"Qm1\"}\r\n".to_vec()),
        Message::text("-ERR 'Authorization Violation'\r\n"),
    ])
    .await;
    let stream = settings(url);
    let handler = RecordingHandler::with_trace(Trace::default());
    let config = SessionConfig {
        subscriptions: stream.subscriptions.clone(),
        ..SessionConfig::default()
    };
    let (events, _log) = EventLog::memory();
    let mut sup = Supervisor::new(
        WsConnector::new(stream),
        config,
        handler.clone(),
        events,
        BackoffConfig::default(),
    );

    let (error, _) = sup.attempt().await;
    assert!(error.is_protocol(), "{error}");

    let deliveries = handler.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(&deliveries[0].body()[..], b"{\"cid\":\"Qm1\"}");
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = WsConnector::new(settings(format!("ws://{addr}/")));
    let err = connector.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
    assert!(!err.is_protocol());
}
