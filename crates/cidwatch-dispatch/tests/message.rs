//! Message decoding, records, and validation through the handler.

mod common;

use std::sync::Arc;

use bytes::Bytes;
use cidwatch_dispatch::{Dispatcher, MessageHandler, Validator};
use cidwatch_logging::{EventLog, MemoryLog, RawLog};
use cidwatch_settings::{FetchStrategy, ValidationSettings};
use cidwatch_wire::Delivery;
use common::{MockFetcher, MockPin, gateway_settings, pin_settings};

fn handler(validation: ValidationSettings, raw: RawLog) -> (MessageHandler, MemoryLog) {
    let (events, log) = EventLog::memory();
    let dispatcher = Dispatcher::new(
        MockPin::ok(),
        MockFetcher::new(&[]),
        pin_settings(Some("jwt")),
        gateway_settings(FetchStrategy::All),
        events.clone(),
    );
    let handler = MessageHandler::new(
        Arc::new(dispatcher),
        Validator::new(validation),
        events,
        raw,
    );
    (handler, log)
}

fn delivery(subject: &str, body: &str) -> Delivery {
    Delivery::new(subject, "1", Bytes::copy_from_slice(body.as_bytes()))
}

// ── decoding ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn object_body_recorded_and_dispatched() {
    let (h, log) = handler(ValidationSettings::default(), RawLog::disabled());
    let ticket = h.handle(&delivery(
        "newCoinCreated.prod",
        r#"{"mint":"M1","image":"ipfs://QmImg","cid":"QmDirect"}"#,
    ));
    // pin + two gateways, for each of two identifiers
    assert_eq!(ticket.len(), 6);

    let message = &log.events("message")[0];
    assert_eq!(message["subject"], "newCoinCreated.prod");
    assert_eq!(message["mint"], "M1");
    assert_eq!(message["image"], "ipfs://QmImg");
    assert_eq!(message["cids"], serde_json::json!(["QmDirect", "QmImg"]));

    ticket.join().await;
    assert_eq!(log.count("dispatch"), 6);
}

#[tokio::test(start_paused = true)]
async fn missing_fields_logged_as_null() {
    let (h, log) = handler(ValidationSettings::default(), RawLog::disabled());
    assert!(h.handle(&delivery("s", r#"{"other":1}"#)).is_empty());

    let message = &log.events("message")[0];
    assert!(message["mint"].is_null());
    assert!(message["image"].is_null());
    assert_eq!(message["cids"], serde_json::json!([]));
}

#[tokio::test]
async fn quoted_json_body_decoded() {
    let (h, log) = handler(ValidationSettings::default(), RawLog::disabled());
    let ticket = h.handle(&delivery("s", r#""{\"cid\":\"Qm1\"}""#));
    assert_eq!(ticket.len(), 3);
    assert_eq!(log.events("message")[0]["cids"], serde_json::json!(["Qm1"]));
}

#[tokio::test]
async fn non_object_body_recorded() {
    let (h, log) = handler(ValidationSettings::default(), RawLog::disabled());
    assert!(h.handle(&delivery("s", "[1,2,3]")).is_empty());
    assert!(h.handle(&delivery("s", "42")).is_empty());

    assert_eq!(log.count("message_non_object"), 2);
    assert_eq!(log.count("message"), 0);
}

#[tokio::test]
async fn undecodable_body_recorded_with_preview() {
    let (h, log) = handler(ValidationSettings::default(), RawLog::disabled());
    let body = format!("not json {}", "x".repeat(500));
    assert!(h.handle(&delivery("s", &body)).is_empty());

    let record = &log.events("message_decode_error")[0];
    assert_eq!(record["subject"], "s");
    assert!(!record["error"].as_str().unwrap().is_empty());
    let preview = record["payload_preview"].as_str().unwrap();
    assert_eq!(preview.chars().count(), 200);
    assert!(preview.starts_with("not json "));
}

#[tokio::test]
async fn raw_log_receives_body() {
    let raw_sink = MemoryLog::default();
    let (h, _log) = handler(ValidationSettings::default(), RawLog::new(raw_sink.clone()));
    let _ = h.handle(&delivery("s", "{}"));

    let lines = raw_sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] MSG s 2"), "{}", lines[0]);
    assert_eq!(lines[1], "{}");
}

// ── validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn violations_recorded_but_dispatch_proceeds() {
    let validation = ValidationSettings {
        enabled: true,
        allowed_subject_prefixes: vec!["newCoinCreated".to_string()],
        require_mint: true,
        require_image: true,
        require_info_keys: Vec::new(),
    };
    let (h, log) = handler(validation, RawLog::disabled());
    let ticket = h.handle(&delivery("other.subject", r#"{"cid":"Qm1","mint":""}"#));
    assert_eq!(ticket.len(), 3);

    let reasons: Vec<String> = log
        .events("validation_error")
        .iter()
        .map(|r| r["reason"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        reasons,
        vec!["subject_disallowed", "missing_mint", "missing_image"]
    );
    assert!(
        log.events("validation_error")
            .iter()
            .all(|r| r["subject"] == "other.subject")
    );
}

#[tokio::test]
async fn validation_disabled_is_silent() {
    let validation = ValidationSettings {
        require_mint: true,
        ..ValidationSettings::default()
    };
    let (h, log) = handler(validation, RawLog::disabled());
    let _ = h.handle(&delivery("s", "{}"));
    assert_eq!(log.count("validation_error"), 0);
}
