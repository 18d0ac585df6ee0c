//! Monitoring App (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                    MONITORING APP                      │
//!                    │                                                        │
//!   Client Request   │  ┌──────────┐   ┌──────────────────┐   ┌──────────┐  │
//!   ─────────────────┼─▶│  axum    │──▶│ instrumentation  │──▶│ handlers │  │
//!                    │  │  server  │   │    middleware    │   └────┬─────┘  │
//!                    │  └────┬─────┘   └───┬──────────┬───┘        │        │
//!                    │       │ /metrics    │          │            │        │
//!                    │       ▼             ▼          ▼            ▼        │
//!                    │  ┌──────────────────────┐  ┌─────────────────────┐   │
//!                    │  │   MetricRegistry     │  │    EventLogger      │   │
//!                    │  │ counters / gauges    │  │ stdout │ loki │ ... │   │
//!                    │  └──────────────────────┘  └──────────▲──────────┘   │
//!                    │                                       │              │
//!                    │                            ┌──────────┴──────────┐   │
//!                    │                            │ BackgroundScheduler │   │
//!                    │                            │  (every 30s tick)   │   │
//!                    │                            └─────────────────────┘   │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use tokio::net::TcpListener;

use monitoring_app::config::resolve_config;
use monitoring_app::lifecycle::signals::spawn_signal_listener;
use monitoring_app::observability::logging::init_tracing;
use monitoring_app::{AppServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os("APP_CONFIG").map(PathBuf::from);
    let config = resolve_config(config_path.as_deref())?;

    init_tracing(&config.logging);
    tracing::info!("monitoring-app v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        request_timeout_secs = config.timeouts.request_secs,
        remote_sink = config.logging.remote.enabled,
        scheduler_interval_secs = config.scheduler.interval_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let server = AppServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
