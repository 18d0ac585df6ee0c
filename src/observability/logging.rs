//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the process
//! - Pick JSON or human-readable output from configuration
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - This subscriber carries process diagnostics; application events are
//!   written to stdout by `ConsoleSink` in the same JSON-or-plain format

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. Subsequent calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "monitoring_app={level},tower_http=info",
            level = config.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
