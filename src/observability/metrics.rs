//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own every counter and gauge for the lifetime of the process
//! - Increment/set instruments from concurrent request tasks without lost updates
//! - Render a Prometheus-compatible text snapshot for the `/metrics` endpoint
//!
//! # Metrics
//! - `app_requests_total` (counter): completed requests by method, status
//! - `app_errors_total` (counter): completed requests with status >= 400
//! - `app_health_status` (gauge): 1 once the health endpoint has answered
//!
//! # Design Decisions
//! - Each `MetricRegistry` owns its own `prometheus::Registry`, never the default global
//! - Handles wrap `prometheus` instruments, so increments are lock-free atomics
//! - The name table is only touched on registration; it rejects a name that is
//!   already taken by any instrument kind
//! - Snapshots are `gather()` + `TextEncoder`: sorted by family name and label
//!   values, so repeated scrapes without traffic are byte-identical

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

/// Content type served alongside [`MetricRegistry::snapshot`].
pub const EXPOSITION_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Errors raised while registering or updating instruments.
///
/// These are programmer errors: at startup they abort the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("metric `{0}` is already registered")]
    DuplicateMetric(String),

    #[error("metric `{metric}` expects labels {expected:?}, got {got:?}")]
    LabelMismatch {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("invalid metric definition: {0}")]
    InvalidName(String),

    #[error("metric registration failed: {0}")]
    Registration(String),
}

/// Registry of all process instruments.
pub struct MetricRegistry {
    registry: Registry,
    names: RwLock<BTreeSet<String>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            names: RwLock::new(BTreeSet::new()),
        }
    }

    /// Register a counter with the given label dimensions.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Counter, MetricsError> {
        let opts = Opts::new(name, help);
        let kind = if label_names.is_empty() {
            let counter = IntCounter::with_opts(opts).map_err(invalid)?;
            self.register_collector(Box::new(counter.clone()))?;
            CounterKind::Plain(counter)
        } else {
            let counter = IntCounterVec::new(opts, label_names).map_err(invalid)?;
            self.register_collector(Box::new(counter.clone()))?;
            CounterKind::Labeled(counter)
        };

        Ok(Counter {
            name: name.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            kind,
        })
    }

    /// Register a gauge. Its value starts at 0.
    pub fn register_gauge(&self, name: &str, help: &str) -> Result<Gauge, MetricsError> {
        let gauge = prometheus::Gauge::with_opts(Opts::new(name, help)).map_err(invalid)?;
        self.register_collector(Box::new(gauge.clone()))?;
        Ok(Gauge {
            name: name.to_string(),
            inner: gauge,
        })
    }

    /// Register an arbitrary collector, e.g. the process collector.
    ///
    /// Every metric family it describes claims its name in the registry.
    pub fn register_collector(&self, collector: Box<dyn Collector>) -> Result<(), MetricsError> {
        let families: Vec<String> = collector
            .desc()
            .iter()
            .map(|desc| desc.fq_name.clone())
            .collect();

        let mut names = self
            .names
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(taken) = families.iter().find(|name| names.contains(*name)) {
            return Err(MetricsError::DuplicateMetric(taken.clone()));
        }

        self.registry.register(collector).map_err(|e| match e {
            prometheus::Error::AlreadyReg => MetricsError::DuplicateMetric(families.join(",")),
            other => MetricsError::Registration(other.to_string()),
        })?;

        names.extend(families);
        Ok(())
    }

    /// Number of registered metric families.
    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every instrument in Prometheus text exposition format.
    ///
    /// Read-only: never creates series or touches values. Labeled counters
    /// without any series are omitted.
    pub fn snapshot(&self) -> String {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics snapshot");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn invalid(e: prometheus::Error) -> MetricsError {
    MetricsError::InvalidName(e.to_string())
}

#[derive(Clone)]
enum CounterKind {
    Plain(IntCounter),
    Labeled(IntCounterVec),
}

/// Handle to a registered counter. Cheap to clone.
#[derive(Clone)]
pub struct Counter {
    name: String,
    label_names: Vec<String>,
    kind: CounterKind,
}

impl Counter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment the series for `labels` by one.
    pub fn increment(&self, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        self.increment_by(labels, 1)
    }

    /// Increment the series for `labels` by `n`, creating it at zero on first use.
    pub fn increment_by(&self, labels: &[(&str, &str)], n: u64) -> Result<(), MetricsError> {
        let values = self.label_values(labels)?;
        match &self.kind {
            CounterKind::Plain(counter) => counter.inc_by(n),
            CounterKind::Labeled(vec) => vec
                .get_metric_with_label_values(&values)
                .map_err(|_| self.mismatch(labels))?
                .inc_by(n),
        }
        Ok(())
    }

    /// Current count for `labels`; 0 for a series that was never incremented.
    ///
    /// Does not create the series.
    pub fn value(&self, labels: &[(&str, &str)]) -> Result<u64, MetricsError> {
        let values = self.label_values(labels)?;
        let vec = match &self.kind {
            CounterKind::Plain(counter) => return Ok(counter.get()),
            CounterKind::Labeled(vec) => vec,
        };

        let count = vec
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                self.label_names.iter().zip(&values).all(|(name, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == name.as_str() && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_counter().get_value() as u64)
            .unwrap_or(0);
        Ok(count)
    }

    /// Order label values by the registered label names.
    fn label_values<'a>(&self, labels: &[(&str, &'a str)]) -> Result<Vec<&'a str>, MetricsError> {
        let keys: HashSet<&str> = labels.iter().map(|(k, _)| *k).collect();
        if labels.len() != self.label_names.len() || keys.len() != labels.len() {
            return Err(self.mismatch(labels));
        }

        self.label_names
            .iter()
            .map(|name| {
                labels
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| self.mismatch(labels))
            })
            .collect()
    }

    fn mismatch(&self, labels: &[(&str, &str)]) -> MetricsError {
        MetricsError::LabelMismatch {
            metric: self.name.clone(),
            expected: self.label_names.clone(),
            got: labels.iter().map(|(k, _)| k.to_string()).collect(),
        }
    }
}

/// Handle to a registered gauge. Cheap to clone.
#[derive(Clone)]
pub struct Gauge {
    name: String,
    inner: prometheus::Gauge,
}

impl Gauge {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overwrite the current value (last write wins).
    pub fn set(&self, value: f64) {
        self.inner.set(value);
    }

    pub fn value(&self) -> f64 {
        self.inner.get()
    }
}
