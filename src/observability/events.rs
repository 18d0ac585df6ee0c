//! Structured events and the logger that fans them out to sinks.
//!
//! An [`Event`] is built once per `log()` call and handed by reference to each
//! configured [`EventSink`](crate::observability::sinks::EventSink). Sinks are
//! independent: one failing sink neither stops the others nor reaches the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observability::sinks::EventSink;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(format!("unknown event level `{}`", other)),
        }
    }
}

/// Scalar value attached to an event field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(v) => f.write_str(v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::Str(v.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

const RESERVED_KEYS: [&str; 3] = ["level", "message", "timestamp"];

/// Ordered key-value fields of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Keys owned by the event itself (`level`, `message`, `timestamp`) are
    /// stored as `field_<key>` so they cannot shadow it once flattened.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let mut key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            key = format!("field_{}", key);
        }
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

/// An immutable structured log event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Event {
    pub fn new(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            fields,
        }
    }

    /// One-line JSON rendering, the format shipped to log aggregators.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"level\":\"{}\",\"message\":{:?}}}", self.level, self.message)
        })
    }
}

struct SinkSlot {
    sink: Arc<dyn EventSink>,
    /// Set after the first reported failure, cleared on the next success.
    failing: AtomicBool,
}

struct LoggerInner {
    sinks: Vec<SinkSlot>,
    min_level: Level,
}

/// Fan-out logger shared by the middleware, handlers and scheduler.
///
/// Cloning is cheap; all clones share the same sinks.
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<LoggerInner>,
}

impl EventLogger {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>, min_level: Level) -> Self {
        let sinks = sinks
            .into_iter()
            .map(|sink| SinkSlot {
                sink,
                failing: AtomicBool::new(false),
            })
            .collect();

        Self {
            inner: Arc::new(LoggerInner { sinks, min_level }),
        }
    }

    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.len()
    }

    /// Build an event and hand it to every sink. Never fails.
    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        if level < self.inner.min_level {
            return;
        }
        self.dispatch(&Event::new(level, message, fields));
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(Level::Error, message, fields);
    }

    fn dispatch(&self, event: &Event) {
        for slot in &self.inner.sinks {
            match slot.sink.emit(event) {
                Ok(()) => {
                    if slot.failing.swap(false, Ordering::Relaxed) {
                        tracing::info!(sink = slot.sink.name(), "Event sink recovered");
                    }
                }
                Err(e) => {
                    if !slot.failing.swap(true, Ordering::Relaxed) {
                        tracing::warn!(sink = slot.sink.name(), error = %e, "Event sink failed, dropping events");
                    } else {
                        tracing::debug!(sink = slot.sink.name(), error = %e, "Event dropped");
                    }
                }
            }
        }
    }
}
