//! Structured run events.
//!
//! Components never format log lines. They emit [`Event`]s through an
//! [`EventEmitter`], and the caller decides where events go by choosing the
//! [`EventSink`] it injects.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pipeline phase an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Downloading a source
    Fetching,
    /// Parsing a downloaded payload
    Normalizing,
    /// Merging provider results
    Aggregating,
    /// Writing the zone file
    Rendering,
    /// Run finished, report available
    Finished,
}

impl Phase {
    /// Lower-case phase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Aggregating => "aggregating",
            Self::Rendering => "rendering",
            Self::Finished => "finished",
        }
    }
}

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Per-attempt detail
    Debug,
    /// Normal progress
    Info,
    /// Degraded but continuing
    Warn,
    /// Run-fatal or source-fatal
    Error,
}

/// One structured event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Run the event belongs to
    pub run_id: Uuid,
    /// Phase that emitted it
    pub phase: Phase,
    /// Source it concerns, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Severity
    pub level: Level,
    /// Short, stable description
    pub message: String,
    /// Additional key/value data
    pub fields: Map<String, Value>,
}

impl Event {
    /// Look up a field
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Destination for run events
pub trait EventSink: Send + Sync {
    /// Receive one event. Must not block for long.
    fn emit(&self, event: &Event);
}

/// Forwards events to `tracing`, keeping their fields structured
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        let fields = Value::Object(event.fields.clone());
        let phase = event.phase.as_str();
        let source_id = event.source_id.as_deref();
        match event.level {
            Level::Debug => {
                debug!(run_id = %event.run_id, phase, source_id, fields = %fields, "{}", event.message);
            }
            Level::Info => {
                info!(run_id = %event.run_id, phase, source_id, fields = %fields, "{}", event.message);
            }
            Level::Warn => {
                warn!(run_id = %event.run_id, phase, source_id, fields = %fields, "{}", event.message);
            }
            Level::Error => {
                error!(run_id = %event.run_id, phase, source_id, fields = %fields, "{}", event.message);
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Keeps the most recent events in memory
#[derive(Debug)]
pub struct MemorySink {
    buffer: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl MemorySink {
    /// Create a sink holding at most `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Snapshot of the buffered events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.iter().cloned().collect()
    }

    /// Buffered events matching `phase`
    #[must_use]
    pub fn events_in(&self, phase: Phase) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.phase == phase)
            .collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
    }
}

/// A sink bound to one run id
#[derive(Clone)]
pub struct EventEmitter {
    run_id: Uuid,
    sink: Arc<dyn EventSink>,
}

impl EventEmitter {
    /// Bind `sink` to a fresh run id
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_run_id(Uuid::new_v4(), sink)
    }

    /// Bind `sink` to an existing run id
    #[must_use]
    pub fn with_run_id(run_id: Uuid, sink: Arc<dyn EventSink>) -> Self {
        Self { run_id, sink }
    }

    /// An emitter that drops everything
    #[must_use]
    pub fn null() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// The run id stamped on every event
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Start building an event
    #[must_use]
    pub fn event(&self, phase: Phase, level: Level, message: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            emitter: self,
            event: Event {
                run_id: self.run_id,
                phase,
                source_id: None,
                level,
                message: message.into(),
                fields: Map::new(),
            },
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`EventEmitter::event`]
#[must_use = "events are only delivered by calling emit()"]
pub struct EventBuilder<'a> {
    emitter: &'a EventEmitter,
    event: Event,
}

impl EventBuilder<'_> {
    /// Attach the source the event concerns
    pub fn source(mut self, source_id: &str) -> Self {
        self.event.source_id = Some(source_id.to_string());
        self
    }

    /// Attach a field
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.event.fields.insert(key.to_string(), value.into());
        self
    }

    /// Deliver the event to the sink
    pub fn emit(self) {
        self.emitter.sink.emit(&self.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_stamps_run_id() {
        let sink = Arc::new(MemorySink::new(10));
        let events = EventEmitter::new(sink.clone());

        events
            .event(Phase::Fetching, Level::Debug, "attempt started")
            .source("list-a")
            .field("attempt", 1)
            .emit();

        let captured = sink.events();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].run_id, events.run_id());
        assert_eq!(captured[0].source_id.as_deref(), Some("list-a"));
        assert_eq!(captured[0].field("attempt"), Some(&Value::from(1)));
    }

    #[test]
    fn test_memory_sink_is_bounded() {
        let sink = Arc::new(MemorySink::new(2));
        let events = EventEmitter::new(sink.clone());
        for i in 0..5 {
            events
                .event(Phase::Aggregating, Level::Info, format!("event {i}"))
                .emit();
        }
        let messages: Vec<String> = sink.events().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 3", "event 4"]);
    }

    #[test]
    fn test_event_serializes_flat() {
        let sink = Arc::new(MemorySink::default());
        let events = EventEmitter::new(sink.clone());
        events
            .event(Phase::Rendering, Level::Error, "write failed")
            .emit();
        let json = serde_json::to_value(&sink.events()[0]).unwrap();
        assert_eq!(json["phase"], "rendering");
        assert_eq!(json["level"], "error");
        assert!(json.get("source_id").is_none());
    }
}
