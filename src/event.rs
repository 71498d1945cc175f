//! Progress events and the outbound message sink
//!
//! Every observable step of a run is reported as a small JSON object with
//! an `id` (`-1` for run-level events) and a `verb`, plus verb-specific
//! payload fields. Clients are expected to dispatch on `verb` only.
//!
//! Emission goes through a single [`EventSink`] per run: the underlying
//! transport is not assumed to be concurrency-safe, so the sink owns the
//! writer behind a mutex and fixes the transport message type once.

use std::io;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

/// Id used by run-level events.
pub const RUN_LEVEL: i64 = -1;

/// Transport message type for text payloads (websocket convention).
pub const TEXT_MESSAGE: i32 = 1;

// ============================================================================
// Events
// ============================================================================

/// A progress event, serialized as `{"verb": …, "id": …, …}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verb", rename_all = "lowercase")]
pub enum Event {
    Started { id: i64 },
    GotServers { id: i64, servers: Vec<String>, group: String },
    StartPing { id: i64 },
    GotPing { id: i64, elapse: i64 },
    StartSpeed { id: i64 },
    GotSpeed { id: i64, avg: i64, max: i64, speed: i64 },
    EndOne { id: i64 },
    Eof { id: i64 },
    PicData { id: i64, data: String },
}

impl Event {
    pub fn started() -> Self {
        Event::Started { id: RUN_LEVEL }
    }

    /// Batch announcement of upcoming profiles; `id` is the index of the
    /// first link in the batch.
    pub fn got_servers(id: i64, servers: Vec<String>, group: String) -> Self {
        Event::GotServers { id, servers, group }
    }

    pub fn start_ping(id: i64) -> Self {
        Event::StartPing { id }
    }

    pub fn got_ping(id: i64, elapse: i64) -> Self {
        Event::GotPing { id, elapse }
    }

    pub fn start_speed(id: i64) -> Self {
        Event::StartSpeed { id }
    }

    /// A throughput sample; `(-1, -1, 0)` marks a skipped or dry speed
    /// test.
    pub fn got_speed(id: i64, avg: i64, max: i64, speed: i64) -> Self {
        Event::GotSpeed { id, avg, max, speed }
    }

    pub fn end_one(id: i64) -> Self {
        Event::EndOne { id }
    }

    pub fn eof() -> Self {
        Event::Eof { id: RUN_LEVEL }
    }

    pub fn pic_data(data: String) -> Self {
        Event::PicData { id: RUN_LEVEL, data }
    }

    /// Stable byte encoding of the event.
    pub fn encode(&self) -> Vec<u8> {
        // Serialization of this enum cannot fail; the fallback keeps the
        // sink total anyway.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ============================================================================
// Message sink
// ============================================================================

/// Outbound transport capability, e.g. one side of a websocket.
pub trait MessageWriter: Send {
    fn write_message(&mut self, message_type: i32, data: &[u8]) -> io::Result<()>;
}

/// Writer that logs every message; useful for CLI runs and debugging.
pub struct OutputMessageWriter;

impl MessageWriter for OutputMessageWriter {
    fn write_message(&mut self, _message_type: i32, data: &[u8]) -> io::Result<()> {
        info!("{}", String::from_utf8_lossy(data));
        Ok(())
    }
}

/// Writer that discards everything; the headless default.
pub struct EmptyMessageWriter;

impl MessageWriter for EmptyMessageWriter {
    fn write_message(&mut self, _message_type: i32, _data: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Per-run wrapper around a [`MessageWriter`].
///
/// Serializes concurrent emission and pins the transport message type, so
/// the rest of the engine only ever deals in [`Event`] values.
pub struct EventSink {
    writer: Mutex<Box<dyn MessageWriter>>,
    message_type: i32,
}

impl EventSink {
    pub fn new(writer: Box<dyn MessageWriter>, message_type: i32) -> Self {
        Self {
            writer: Mutex::new(writer),
            message_type,
        }
    }

    /// Sink that swallows all events.
    pub fn discard() -> Self {
        Self::new(Box::new(EmptyMessageWriter), TEXT_MESSAGE)
    }

    /// Encodes and writes one event. Transport failures are logged and
    /// absorbed; a broken observer must not abort the run.
    pub fn send(&self, event: &Event) {
        let data = event.encode();
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writer.write_message(self.message_type, &data) {
            warn!("failed to write progress event: {e}");
        }
    }
}
