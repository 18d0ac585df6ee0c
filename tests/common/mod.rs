//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use monitoring_app::observability::{EventSink, MemorySink, MetricRegistry};
use monitoring_app::{AppConfig, AppServer, Shutdown};

/// A server running on an ephemeral local port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub registry: Arc<MetricRegistry>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the server and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
        assert!(result.is_ok());
    }
}

/// Start a server with the scheduler disabled and events captured in memory.
pub async fn start_server() -> TestServer {
    let mut config = AppConfig::default();
    config.scheduler.enabled = false;
    start_server_with(config, Vec::new()).await
}

/// Start a server with extra sinks next to the in-memory capture.
pub async fn start_server_with(
    mut config: AppConfig,
    mut extra_sinks: Vec<Arc<dyn EventSink>>,
) -> TestServer {
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;

    let sink = Arc::new(MemorySink::new());
    extra_sinks.push(sink.clone());

    let server = AppServer::with_sinks(config, extra_sinks).unwrap();
    let registry = server.registry();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        sink,
        registry,
        shutdown,
        handle,
    }
}

/// Client without connection pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
