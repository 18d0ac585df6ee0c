//! Default process metrics.
//!
//! Registers the `prometheus` process collector next to the application
//! metrics. It reads procfs on every gather, so scrapes always see fresh values.
//! Only Linux exposes these metrics; elsewhere nothing is registered.

use prometheus::proto::MetricFamily;
use serde::{Deserialize, Serialize};

use crate::observability::metrics::{MetricRegistry, MetricsError};

/// Memory usage of the current process, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

impl MemoryUsage {
    fn from_families(families: &[MetricFamily]) -> Self {
        let gauge = |name: &str| {
            families
                .iter()
                .find(|family| family.get_name() == name)
                .and_then(|family| family.get_metric().first())
                .map(|metric| metric.get_gauge().get_value() as u64)
                .unwrap_or_default()
        };

        Self {
            rss_bytes: gauge("process_resident_memory_bytes"),
            virtual_bytes: gauge("process_virtual_memory_bytes"),
        }
    }
}

/// Process-level metrics (`process_*`).
pub struct ProcessMetrics {
    #[cfg(target_os = "linux")]
    reader: prometheus::process_collector::ProcessCollector,
}

impl ProcessMetrics {
    #[cfg(target_os = "linux")]
    pub fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        use prometheus::process_collector::ProcessCollector;

        registry.register_collector(Box::new(ProcessCollector::for_self()))?;
        Ok(Self {
            reader: ProcessCollector::for_self(),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn register(_registry: &MetricRegistry) -> Result<Self, MetricsError> {
        tracing::debug!("Process metrics unavailable on this platform");
        Ok(Self {})
    }

    /// Current memory usage; zeroes where the platform reports none.
    #[cfg(target_os = "linux")]
    pub fn memory(&self) -> MemoryUsage {
        use prometheus::core::Collector;

        MemoryUsage::from_families(&self.reader.collect())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn memory(&self) -> MemoryUsage {
        MemoryUsage::default()
    }
}
