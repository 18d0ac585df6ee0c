//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::observability::Level;

/// Root configuration for the monitoring app.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Log output and event sinks.
    pub logging: LoggingConfig,

    /// Background task simulator.
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Apply overrides from the process environment (`PORT`, `LOKI_URL`).
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(port) => self.listener.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(url) = lookup("LOKI_URL") {
            self.logging.remote.url = url;
            self.logging.remote.enabled = true;
        }
        self
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,

    /// Remote aggregation sink.
    pub remote: RemoteSinkConfig,
}

impl LoggingConfig {
    /// Minimum level for application events. `trace` and `debug` map to info.
    pub fn event_level(&self) -> Level {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Level::Info,
            other => other.parse().unwrap_or(Level::Info),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
            remote: RemoteSinkConfig::default(),
        }
    }
}

/// Loki push sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSinkConfig {
    /// Enable delivery to the remote endpoint.
    pub enabled: bool,

    /// Base URL of the Loki server (e.g., "http://localhost:3100").
    pub url: String,

    /// Static stream labels attached to every pushed event.
    pub labels: BTreeMap<String, String>,

    /// Per-push timeout in milliseconds.
    pub timeout_ms: u64,

    /// Events buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for RemoteSinkConfig {
    fn default() -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("job".to_string(), "monitoring-app".to_string());
        labels.insert("service".to_string(), "monitoring-app".to_string());

        Self {
            enabled: false,
            url: "http://localhost:3100".to_string(),
            labels,
            timeout_ms: 2000,
            queue_capacity: 1024,
        }
    }
}

/// Background task simulator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the simulator.
    pub enabled: bool,

    /// Seconds between ticks.
    pub interval_secs: u64,

    /// Probability in [0, 1] that a tick is reported as failed.
    pub failure_probability: f64,

    /// Task names picked uniformly at random.
    pub tasks: Vec<String>,

    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            failure_probability: 0.2,
            tasks: vec!["backup".into(), "cleanup".into(), "sync".into()],
            seed: None,
        }
    }
}
