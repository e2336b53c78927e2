//! Append-only line sinks.
//!
//! Every record is one line: `[<local ts>] <json>`. The timestamp is taken
//! while the sink lock is held, so timestamps never go backwards in file
//! order. Writes are best-effort: a failed write is reported through
//! `tracing` and dropped.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::errors::LogError;
use crate::events::LogEvent;

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Local time with millisecond precision, e.g. `2025-09-18 14:03:07.412`.
pub fn now_ts_ms() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

fn open_append(path: &Path) -> Result<Box<dyn Write + Send>, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|file| Box::new(file) as Box<dyn Write + Send>)
        .map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn write_lines(sink: &Sink, lines: &[&str]) {
    let mut guard = sink.lock();
    let result = lines
        .iter()
        .try_for_each(|line| writeln!(guard, "{line}"))
        .and_then(|()| guard.flush());
    if let Err(error) = result {
        tracing::warn!(%error, "event log write failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventLog
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Record<'a> {
    ts: &'a str,
    #[serde(flatten)]
    event: &'a LogEvent,
}

/// Shared handle to the structured event log.
///
/// Cloning is cheap; all clones append to the same sink under one lock.
#[derive(Clone)]
pub struct EventLog {
    sink: Sink,
}

impl EventLog {
    /// Log to an arbitrary writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Append to a file, creating it if missing.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        Ok(Self {
            sink: Arc::new(Mutex::new(open_append(path)?)),
        })
    }

    /// Log to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Resolve a configured target: `-` is stdout, anything else a file path.
    pub fn from_target(target: &str) -> Result<Self, LogError> {
        if target == "-" {
            Ok(Self::stdout())
        } else {
            Self::open(Path::new(target))
        }
    }

    /// In-memory log for tests, with a handle to read it back.
    pub fn memory() -> (Self, MemoryLog) {
        let memory = MemoryLog::default();
        (Self::new(memory.clone()), memory)
    }

    /// Append one record.
    pub fn record(&self, event: LogEvent) {
        let mut guard = self.sink.lock();
        let ts = now_ts_ms();
        let json = match serde_json::to_string(&Record { ts: &ts, event: &event }) {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(%error, event = event.name(), "event serialization failed");
                return;
            }
        };
        tracing::trace!(target: "cidwatch::events", %json);
        let result = writeln!(guard, "[{ts}] {json}").and_then(|()| guard.flush());
        if let Err(error) = result {
            tracing::warn!(%error, event = event.name(), "event log write failed");
        }
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RawLog
// ─────────────────────────────────────────────────────────────────────────────

/// Verbatim dump of every delivered payload. Disabled unless opened.
#[derive(Clone, Default)]
pub struct RawLog {
    sink: Option<Sink>,
}

impl RawLog {
    /// A raw log that discards everything.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Append to a file, creating it if missing.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        Ok(Self {
            sink: Some(Arc::new(Mutex::new(open_append(path)?))),
        })
    }

    /// Log to an arbitrary writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// Whether records are written anywhere.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Write a `[ts] MSG <subject> <len>` header line followed by the payload.
    pub fn record(&self, subject: &str, payload: &[u8]) {
        let Some(sink) = &self.sink else { return };
        let header = format!("[{}] MSG {subject} {}", now_ts_ms(), payload.len());
        let body = String::from_utf8_lossy(payload);
        write_lines(sink, &[&header, &body]);
    }
}

impl std::fmt::Debug for RawLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawLog")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryLog
// ─────────────────────────────────────────────────────────────────────────────

/// Shared in-memory buffer behind [`EventLog::memory`].
#[derive(Clone, Default)]
pub struct MemoryLog {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MemoryLog {
    /// All complete lines written so far.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// The JSON part of every line, parsed.
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| line.split_once("] ").map(|(_, json)| json))
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }

    /// Records whose `event` equals `name`.
    pub fn events(&self, name: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["event"] == name)
            .collect()
    }

    /// Number of records whose `event` equals `name`.
    pub fn count(&self, name: &str) -> usize {
        self.events(name).len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
