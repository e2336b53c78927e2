//! Incremental frame decoding.
//!
//! The decoder is a two-state machine:
//! - **Line**: split the buffer at the first `\r\n` and classify the line
//! - **Payload**: a `MSG`/`HMSG` line announced `N` bytes; wait until `N`
//!   bytes plus the terminator are buffered, then slice them out
//!
//! While a payload is pending no control line is parsed, so payload bytes
//! that happen to contain `\r\n` are never mistaken for a line. Because all
//! state lives in the codec and the buffer, the frames produced do not
//! depend on how the input was chunked.

use bytes::{Buf, BytesMut};
use serde_json::{Map, Value};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::CRLF;
use crate::errors::{Result, WireError};
use crate::frame::{Delivery, Frame};

/// Default ceiling for a single announced payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// A `MSG`/`HMSG` header waiting for its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingDelivery {
    subject: String,
    sid: String,
    header_len: Option<usize>,
    total_len: usize,
}

/// Decoder for inbound frames.
#[derive(Debug)]
pub struct FrameCodec {
    pending: Option<PendingDelivery>,
    max_payload: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Codec with [`DEFAULT_MAX_PAYLOAD_BYTES`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Codec with a custom payload ceiling.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            pending: None,
            max_payload,
        }
    }

    /// Whether a payload obligation is outstanding.
    pub fn is_awaiting_payload(&self) -> bool {
        self.pending.is_some()
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<Frame>> {
        let (verb, rest) = match line.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        if verb.eq_ignore_ascii_case("INFO") {
            return Ok(Some(Frame::ServerInfo(parse_info(rest))));
        }
        if verb.eq_ignore_ascii_case("PING") {
            return Ok(Some(Frame::Ping));
        }
        if verb.eq_ignore_ascii_case("PONG") {
            return Ok(Some(Frame::Pong));
        }
        if verb.eq_ignore_ascii_case("-ERR") {
            return Ok(Some(Frame::ProtocolError(clean_error(rest))));
        }
        if verb.eq_ignore_ascii_case("MSG") {
            let fields: Vec<&str> = rest.split_ascii_whitespace().collect();
            let [total_len] = parse_lengths("MSG", line, &fields, ["length"])?;
            self.expect_payload(&fields, None, total_len)?;
            return Ok(None);
        }
        if verb.eq_ignore_ascii_case("HMSG") {
            let fields: Vec<&str> = rest.split_ascii_whitespace().collect();
            let [header_len, total_len] =
                parse_lengths("HMSG", line, &fields, ["header length", "total length"])?;
            if header_len > total_len {
                return Err(WireError::HeaderExceedsTotal {
                    header_len,
                    total_len,
                });
            }
            self.expect_payload(&fields, Some(header_len), total_len)?;
            return Ok(None);
        }

        trace!(verb, "ignoring unrecognized control line");
        Ok(None)
    }

    fn expect_payload(
        &mut self,
        fields: &[&str],
        header_len: Option<usize>,
        total_len: usize,
    ) -> Result<()> {
        if total_len > self.max_payload {
            return Err(WireError::PayloadTooLarge {
                len: total_len,
                max: self.max_payload,
            });
        }
        // parse_lengths guarantees subject and sid are present
        self.pending = Some(PendingDelivery {
            subject: fields[0].to_string(),
            sid: fields[1].to_string(),
            header_len,
            total_len,
        });
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match self.pending.take() {
                Some(pending) if src.len() < pending.total_len + CRLF.len() => {
                    self.pending = Some(pending);
                    return Ok(None);
                }
                Some(pending) => {
                    let payload = src.split_to(pending.total_len).freeze();
                    if src.starts_with(CRLF) {
                        src.advance(CRLF.len());
                    } else {
                        debug!(subject = %pending.subject, "payload terminator missing, continuing");
                    }
                    return Ok(Some(Frame::Delivery(Delivery {
                        subject: pending.subject,
                        sid: pending.sid,
                        header_len: pending.header_len,
                        payload,
                    })));
                }
                None => {}
            }

            let Some(end) = src.windows(CRLF.len()).position(|w| w == CRLF) else {
                return Ok(None);
            };
            let raw = src.split_to(end);
            src.advance(CRLF.len());

            let line = String::from_utf8_lossy(&raw);
            if line.trim().is_empty() {
                continue;
            }
            if let Some(frame) = self.parse_line(&line)? {
                return Ok(Some(frame));
            }
        }
    }
}

/// `INFO` body as an object; anything else yields empty fields.
fn parse_info(json: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => {
            debug!("INFO body is not a JSON object");
            Map::new()
        }
    }
}

/// `-ERR 'Authorization Violation'` → `Authorization Violation`.
fn clean_error(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text)
        .to_string()
}

/// Read the `N` trailing length fields of a `MSG`/`HMSG` header.
///
/// `fields` excludes the verb. Lengths normally sit right after
/// `<subject> <sid>`; when they do not parse there and exactly one extra
/// field is present, that field is taken as a reply subject and the lengths
/// are read after it. Further trailing fields are ignored.
fn parse_lengths<const N: usize>(
    verb: &'static str,
    line: &str,
    fields: &[&str],
    names: [&'static str; N],
) -> Result<[usize; N]> {
    if fields.len() < 2 + N {
        return Err(WireError::MalformedHeader {
            verb,
            line: line.to_string(),
        });
    }

    let read_at = |offset: usize| -> Result<[usize; N]> {
        let mut lengths = [0usize; N];
        for (i, &field) in names.iter().enumerate() {
            lengths[i] = fields[offset + i]
                .parse()
                .map_err(|_| WireError::InvalidLength {
                    verb,
                    field,
                    line: line.to_string(),
                })?;
        }
        Ok(lengths)
    };

    match read_at(2) {
        Err(err) if fields.len() == 3 + N => read_at(3).map_err(|_| err),
        other => other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameReader
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the receive buffer of one connection.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: BytesMut,
    codec: FrameCodec,
}

impl FrameReader {
    /// Reader with the default payload ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader with a custom payload ceiling.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            codec: FrameCodec::with_max_payload(max_payload),
        }
    }

    /// Append received bytes without decoding.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.codec.decode(&mut self.buf)
    }

    /// Append a chunk and decode every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes held but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Whether a payload obligation is outstanding.
    pub fn is_awaiting_payload(&self) -> bool {
        self.codec.is_awaiting_payload()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bytes::Bytes;

    use super::*;

    fn decode_all(input: &[u8]) -> Vec<Frame> {
        FrameReader::new().push(input).unwrap()
    }

    // ── control lines ───────────────────────────────────────────────

    #[test]
    fn info_decodes_object() {
        let frames = decode_all(b"INFO {\"server_id\":\"x\",\"max_payload\":1048576}\r\n");
        assert_matches!(&frames[..], [Frame::ServerInfo(fields)] => {
            assert_eq!(fields["server_id"], "x");
            assert_eq!(fields.len(), 2);
        });
    }

    #[test]
    fn info_with_bad_json_is_empty() {
        let frames = decode_all(b"INFO {not json\r\nINFO [1]\r\n");
        assert_eq!(frames, vec![Frame::ServerInfo(Map::new()), Frame::ServerInfo(Map::new())]);
    }

    #[test]
    fn ping_pong() {
        assert_eq!(decode_all(b"PING\r\nPONG\r\n"), vec![Frame::Ping, Frame::Pong]);
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(decode_all(b"ping\r\nPong\r\n"), vec![Frame::Ping, Frame::Pong]);
    }

    #[test]
    fn err_strips_quotes() {
        let frames = decode_all(b"-ERR 'Authorization Violation'\r\n");
        assert_eq!(
            frames,
            vec![Frame::ProtocolError("Authorization Violation".into())]
        );
    }

    #[test]
    fn err_without_quotes_kept() {
        let frames = decode_all(b"-ERR  Unknown Protocol Operation \r\n");
        assert_eq!(
            frames,
            vec![Frame::ProtocolError("Unknown Protocol Operation".into())]
        );
    }

    #[test]
    fn unknown_and_empty_lines_ignored() {
        let frames = decode_all(b"+OK\r\n\r\nFOO bar\r\nPING\r\n");
        assert_eq!(frames, vec![Frame::Ping]);
    }

    #[test]
    fn incomplete_line_waits() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"PIN").unwrap().is_empty());
        assert_eq!(reader.buffered(), 3);
        assert_eq!(reader.push(b"G\r\n").unwrap(), vec![Frame::Ping]);
        assert_eq!(reader.buffered(), 0);
    }

    // ── MSG ─────────────────────────────────────────────────────────

    #[test]
    fn msg_payload_exact() {
        let frames = decode_all(b"MSG subj 4 13\r\n{\"cid\":\"Qm1\"}\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d)] => {
            assert_eq!(d.subject, "subj");
            assert_eq!(d.sid, "4");
            assert_eq!(d.header_len, None);
            assert_eq!(d.payload, Bytes::from_static(b"{\"cid\":\"Qm1\"}"));
        });
    }

    #[test]
    fn msg_zero_length() {
        let frames = decode_all(b"MSG a 1 0\r\n\r\nPING\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d), Frame::Ping] => {
            assert!(d.payload.is_empty());
        });
    }

    #[test]
    fn msg_payload_may_contain_crlf() {
        let frames = decode_all(b"MSG a 1 6\r\nPI\r\nNG\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d)] => {
            assert_eq!(d.payload, Bytes::from_static(b"PI\r\nNG"));
        });
    }

    #[test]
    fn msg_waits_for_payload_and_terminator() {
        let mut reader = FrameReader::new();
        assert!(reader.push(b"MSG a 1 3\r\nabc").unwrap().is_empty());
        assert!(reader.is_awaiting_payload());
        assert!(reader.push(b"\r").unwrap().is_empty());
        assert_eq!(reader.push(b"\n").unwrap().len(), 1);
        assert!(!reader.is_awaiting_payload());
    }

    #[test]
    fn missing_terminator_is_tolerated() {
        let frames = decode_all(b"MSG a 1 3\r\nabcPING\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d), Frame::Ping] => {
            assert_eq!(d.payload, Bytes::from_static(b"abc"));
        });
    }

    #[test]
    fn msg_with_reply_subject() {
        let frames = decode_all(b"MSG a 1 _INBOX.x 2\r\nhi\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d)] => {
            assert_eq!(d.payload, Bytes::from_static(b"hi"));
        });
    }

    #[test]
    fn msg_trailing_fields_ignored() {
        let frames = decode_all(b"MSG a 1 2 extra more\r\nhi\r\n");
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn msg_too_few_fields_is_fatal() {
        let err = FrameReader::new().push(b"MSG a 1\r\n").unwrap_err();
        assert_matches!(err, WireError::MalformedHeader { verb: "MSG", .. });
    }

    #[test]
    fn msg_non_numeric_length_is_fatal() {
        let err = FrameReader::new().push(b"MSG a 1 x\r\n").unwrap_err();
        assert_matches!(err, WireError::InvalidLength { verb: "MSG", field: "length", .. });
    }

    #[test]
    fn msg_over_ceiling_is_fatal() {
        let err = FrameReader::with_max_payload(4)
            .push(b"MSG a 1 5\r\n")
            .unwrap_err();
        assert_matches!(err, WireError::PayloadTooLarge { len: 5, max: 4 });
    }

    // ── HMSG ────────────────────────────────────────────────────────

    #[test]
    fn hmsg_splits_header_and_body() {
        let frames = decode_all(b"HMSG s 2 12 14\r\nNATS/1.0\r\n\r\n{}\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d)] => {
            assert_eq!(d.header_len, Some(12));
            assert_eq!(d.body().len(), 2);
            assert_eq!(d.headers().unwrap(), Bytes::from_static(b"NATS/1.0\r\n\r\n"));
        });
    }

    #[test]
    fn hmsg_with_reply_subject() {
        let frames = decode_all(b"HMSG s 2 reply 0 1\r\nx\r\n");
        assert_matches!(&frames[..], [Frame::Delivery(d)] => {
            assert_eq!(d.header_len, Some(0));
            assert_eq!(d.body(), Bytes::from_static(b"x"));
        });
    }

    #[test]
    fn hmsg_header_longer_than_total_is_fatal() {
        let err = FrameReader::new().push(b"HMSG s 2 9 4\r\n").unwrap_err();
        assert_matches!(err, WireError::HeaderExceedsTotal { header_len: 9, total_len: 4 });
    }

    #[test]
    fn hmsg_too_few_fields_is_fatal() {
        let err = FrameReader::new().push(b"HMSG s 2 9\r\n").unwrap_err();
        assert_matches!(err, WireError::MalformedHeader { verb: "HMSG", .. });
    }

    // ── decoder trait ───────────────────────────────────────────────

    #[test]
    fn codec_yields_one_frame_per_call() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"PING\r\nPONG\r\nPIN"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Ping));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Pong));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"PIN");
    }
}
