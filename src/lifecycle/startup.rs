//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the metric registry and register every instrument
//! - Build the event logger from the configured sinks
//! - Assemble request instrumentation on top of both
//!
//! # Design Decisions
//! - Fail fast: a registration error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::http::middleware::{RequestInstrumentation, RequestMetrics};
use crate::observability::process::ProcessMetrics;
use crate::observability::sinks::sinks_from_config;
use crate::observability::{EventLogger, EventSink, Gauge, MetricRegistry, MetricsError, SinkError};

/// Fatal errors while bringing the service up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("metric registration failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("event sink setup failed: {0}")]
    Sink(#[from] SinkError),
}

/// Every observability component, wired together once per process.
#[derive(Clone)]
pub struct Telemetry {
    pub registry: Arc<MetricRegistry>,
    pub logger: EventLogger,
    pub instrumentation: Arc<RequestInstrumentation>,
    pub health: Gauge,
    pub process: Arc<ProcessMetrics>,
    pub started: Instant,
}

impl Telemetry {
    /// Build telemetry with the sinks described by `config`.
    ///
    /// Must run inside a Tokio runtime when the remote sink is enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let sinks = sinks_from_config(&config.logging)?;
        Self::with_sinks(config, sinks)
    }

    /// Build telemetry around caller-provided sinks.
    pub fn with_sinks(
        config: &AppConfig,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Result<Self, StartupError> {
        let started = Instant::now();
        let registry = Arc::new(MetricRegistry::new());

        let process = Arc::new(ProcessMetrics::register(&registry)?);
        let request_metrics = RequestMetrics::register(&registry)?;
        let health = registry.register_gauge("app_health_status", "Application health status")?;

        let logger = EventLogger::new(sinks, config.logging.event_level());
        let instrumentation = Arc::new(RequestInstrumentation::new(request_metrics, logger.clone()));

        tracing::info!(
            instruments = registry.len(),
            sinks = logger.sink_count(),
            "Telemetry initialized"
        );

        Ok(Self {
            registry,
            logger,
            instrumentation,
            health,
            process,
            started,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;

    #[test]
    fn test_registers_application_metrics() {
        let telemetry =
            Telemetry::with_sinks(&AppConfig::default(), vec![Arc::new(MemorySink::new())]).unwrap();
        let snapshot = telemetry.registry.snapshot();

        for name in ["app_errors_total", "app_health_status"] {
            assert!(snapshot.contains(&format!("# TYPE {} ", name)), "missing {}", name);
        }
        if cfg!(target_os = "linux") {
            assert!(snapshot.contains("# TYPE process_start_time_seconds gauge"));
        }
        assert!(!snapshot.contains("app_requests_total"));
        assert_eq!(telemetry.logger.sink_count(), 1);
    }

    #[test]
    fn test_second_registration_is_fatal() {
        let telemetry = Telemetry::with_sinks(&AppConfig::default(), Vec::new()).unwrap();
        let err = RequestMetrics::register(&telemetry.registry).err().unwrap();
        assert!(matches!(
            StartupError::from(err),
            StartupError::Metrics(MetricsError::DuplicateMetric(_))
        ));
    }
}
