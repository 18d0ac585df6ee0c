//! Event sinks.
//!
//! # Responsibilities
//! - `ConsoleSink`: synchronous local output, one JSON or plain line per event
//! - `LokiSink`: best-effort remote delivery to a Loki push endpoint
//! - `MemorySink`: in-process capture for inspection and tests
//!
//! # Design Decisions
//! - `emit` never blocks: remote delivery is a bounded `try_send` into a queue
//!   drained by a background worker
//! - Delivery failures are reported locally once until the sink recovers
//! - One queue per sink keeps events in `emit` order

use chrono::SecondsFormat;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::{LoggingConfig, RemoteSinkConfig};
use crate::observability::events::{Event, Level};

/// Maximum events sent in one push request.
const PUSH_BATCH_SIZE: usize = 64;

/// Failure of a single sink to accept an event.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink queue is full")]
    QueueFull,

    #[error("sink is closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A destination for structured events.
pub trait EventSink: Send + Sync {
    /// Short identifier used in local diagnostics.
    fn name(&self) -> &str;

    /// Accept one event. Must return promptly.
    fn emit(&self, event: &Event) -> Result<(), SinkError>;
}

/// Writes one line per event to the process's standard output.
///
/// JSON lines carry the same shape the remote sink ships; the plain format is
/// `timestamp LEVEL message key=value ...`.
pub struct ConsoleSink<W = fn() -> io::Stdout> {
    make_writer: W,
    json: bool,
}

impl ConsoleSink {
    pub fn stdout(json: bool) -> Self {
        Self {
            make_writer: io::stdout,
            json,
        }
    }
}

impl<W> ConsoleSink<W>
where
    W: for<'a> MakeWriter<'a>,
{
    pub fn with_writer(make_writer: W, json: bool) -> Self {
        Self { make_writer, json }
    }

    fn render(&self, event: &Event) -> String {
        if self.json {
            return event.to_json_line();
        }

        let mut line = format!(
            "{} {:>5} {}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            event.level.as_str().to_ascii_uppercase(),
            event.message
        );
        for (key, value) in event.fields.iter() {
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

impl<W> EventSink for ConsoleSink<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "stdout"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        let mut line = self.render(event);
        line.push('\n');
        self.make_writer
            .make_writer()
            .write_all(line.as_bytes())
            .map_err(|e| SinkError::Delivery(e.to_string()))
    }
}

/// Keeps every emitted event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events received so far, in arrival order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level == level).count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget delivery to a Loki push endpoint.
pub struct LokiSink {
    tx: mpsc::Sender<Event>,
}

impl LokiSink {
    /// Start the delivery worker. Must be called inside a Tokio runtime.
    pub fn spawn(config: &RemoteSinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = LokiWorker {
            client,
            push_url: push_url(&config.url),
            labels: config.labels.clone(),
            reported: AtomicBool::new(false),
        };
        tokio::spawn(worker.run(rx));

        tracing::info!(url = %config.url, "Loki event sink started");
        Ok(Self { tx })
    }
}

impl EventSink for LokiSink {
    fn name(&self) -> &str {
        "loki"
    }

    fn emit(&self, event: &Event) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

struct LokiWorker {
    client: reqwest::Client,
    push_url: String,
    labels: BTreeMap<String, String>,
    reported: AtomicBool,
}

impl LokiWorker {
    async fn run(self, mut rx: mpsc::Receiver<Event>) {
        let mut batch = Vec::with_capacity(PUSH_BATCH_SIZE);
        while rx.recv_many(&mut batch, PUSH_BATCH_SIZE).await > 0 {
            let body = push_body(&self.labels, &batch);
            batch.clear();

            match self.client.post(&self.push_url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    if self.reported.swap(false, Ordering::Relaxed) {
                        tracing::info!(url = %self.push_url, "Loki delivery recovered");
                    }
                }
                Ok(response) => self.report(format!("status {}", response.status())),
                Err(e) => self.report(e.to_string()),
            }
        }
        tracing::debug!("Loki event sink stopped");
    }

    fn report(&self, error: String) {
        if !self.reported.swap(true, Ordering::Relaxed) {
            tracing::warn!(url = %self.push_url, error = %error, "Loki delivery failed, events dropped");
        } else {
            tracing::debug!(error = %error, "Loki delivery failed");
        }
    }
}

fn push_url(base: &str) -> String {
    format!("{}/loki/api/v1/push", base.trim_end_matches('/'))
}

/// Build a push payload with one stream per level.
fn push_body(labels: &BTreeMap<String, String>, events: &[Event]) -> serde_json::Value {
    let mut streams: BTreeMap<Level, Vec<serde_json::Value>> = BTreeMap::new();
    for event in events {
        let nanos = event
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        streams
            .entry(event.level)
            .or_default()
            .push(json!([nanos, event.to_json_line()]));
    }

    let streams: Vec<serde_json::Value> = streams
        .into_iter()
        .map(|(level, values)| {
            let mut stream = labels.clone();
            stream.insert("level".to_string(), level.as_str().to_string());
            json!({ "stream": stream, "values": values })
        })
        .collect();

    json!({ "streams": streams })
}

/// Build the sink list described by the logging configuration.
pub fn sinks_from_config(logging: &LoggingConfig) -> Result<Vec<Arc<dyn EventSink>>, SinkError> {
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(ConsoleSink::stdout(logging.json))];
    if logging.remote.enabled {
        sinks.push(Arc::new(LokiSink::spawn(&logging.remote)?));
    }
    Ok(sinks)
}
