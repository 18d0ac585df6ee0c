//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request middleware, handlers, scheduler:
//!     → events.rs (EventLogger builds an Event per call)
//!     → sinks.rs (stdout lines, Loki, in-memory)
//!
//! Request middleware, health handler:
//!     → metrics.rs (counters, gauges)
//!     → process.rs (prometheus process collector)
//!
//! Consumers:
//!     → GET /metrics (Prometheus scrape of MetricRegistry::snapshot)
//!     → Log aggregation (stdout, Loki push API)
//! ```
//!
//! # Design Decisions
//! - Sinks are best-effort; a sink failure never reaches the request path
//! - Metrics are cheap (atomic increments, no registry lock on the hot path)

pub mod events;
pub mod logging;
pub mod metrics;
pub mod process;
pub mod sinks;

pub use events::{Event, EventLogger, FieldValue, Fields, Level};
pub use metrics::{Counter, Gauge, MetricRegistry, MetricsError};
pub use sinks::{ConsoleSink, EventSink, LokiSink, MemorySink, SinkError};
