//! Monitoring App Library
//!
//! A request-serving process that exposes its own operational state:
//! structured event logs, Prometheus-style metrics and a background task
//! simulator that injects synthetic failures.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scheduler;

pub use config::AppConfig;
pub use http::AppServer;
pub use lifecycle::Shutdown;
