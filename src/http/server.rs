//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, instrumentation, timeout, tracing)
//! - Bind server to listener
//! - Start the background scheduler next to the listener
//! - Graceful shutdown

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::middleware::instrument_requests;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::{StartupError, Telemetry};
use crate::observability::{EventLogger, EventSink, MetricRegistry};
use crate::scheduler::BackgroundScheduler;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Telemetry,
}

/// HTTP server for the monitoring app.
pub struct AppServer {
    router: Router,
    config: AppConfig,
    telemetry: Telemetry,
}

impl AppServer {
    /// Create a server whose event sinks come from configuration.
    pub fn new(config: AppConfig) -> Result<Self, StartupError> {
        let telemetry = Telemetry::from_config(&config)?;
        Ok(Self::from_telemetry(config, telemetry))
    }

    /// Create a server that logs events to the given sinks.
    pub fn with_sinks(
        config: AppConfig,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Result<Self, StartupError> {
        let telemetry = Telemetry::with_sinks(&config, sinks)?;
        Ok(Self::from_telemetry(config, telemetry))
    }

    fn from_telemetry(config: AppConfig, telemetry: Telemetry) -> Self {
        let state = AppState {
            telemetry: telemetry.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            telemetry,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// `/metrics` sits outside the instrumentation so scrapes are not counted.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let instrumentation = state.telemetry.instrumentation.clone();

        let app_routes = Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route(
                "/api/users",
                get(handlers::list_users).post(handlers::create_user),
            )
            .route("/api/error", get(handlers::simulated_error))
            .fallback(handlers::not_found)
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn_with_state(
                        instrumentation,
                        instrument_requests,
                    ))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            );

        Router::new()
            .route("/metrics", get(handlers::metrics))
            .with_state(state)
            .merge(app_routes)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.telemetry.registry.clone()
    }

    pub fn logger(&self) -> EventLogger {
        self.telemetry.logger.clone()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let scheduler = if self.config.scheduler.enabled {
            let scheduler =
                BackgroundScheduler::from_config(self.telemetry.logger.clone(), &self.config.scheduler);
            Some(tokio::spawn(scheduler.run(shutdown.resubscribe())))
        } else {
            tracing::info!("Background scheduler disabled");
            None
        };

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        if let Some(handle) = scheduler {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background scheduler task failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{FieldValue, Level, MemorySink};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> (AppServer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut config = AppConfig::default();
        config.scheduler.enabled = false;
        let server = AppServer::with_sinks(config, vec![sink.clone()]).unwrap();
        (server, sink)
    }

    async fn send(router: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_users_request_counted() {
        let (server, sink) = server();
        let (status, body) = send(server.router(), Method::GET, "/api/users", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Jane Smith"));

        let snapshot = server.registry().snapshot();
        assert!(snapshot.contains("app_requests_total{method=\"GET\",status=\"200\"} 1\n"));
        assert!(snapshot.contains("app_errors_total 0\n"));
        assert_eq!(sink.with_message("Request completed").len(), 1);
        assert_eq!(sink.with_message("Users requested").len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_route_not_instrumented() {
        let (server, sink) = server();
        let response = server
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        assert!(response.headers().contains_key("x-request-id"));
        assert!(sink.events().is_empty());
        assert!(!server.registry().snapshot().contains("app_requests_total{"));
    }

    #[tokio::test]
    async fn test_not_found_is_instrumented() {
        let (server, sink) = server();
        let (status, body) = send(server.router(), Method::GET, "/nope?x=1", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("/nope?x=1"));
        assert_eq!(sink.with_message("404 Not Found")[0].level, Level::Warn);
        assert!(server
            .registry()
            .snapshot()
            .contains("app_requests_total{method=\"GET\",status=\"404\"} 1\n"));
        assert_eq!(sink.with_message("Request error").len(), 1);
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let (server, sink) = server();

        let (status, _) = send(server.router(), Method::POST, "/api/users", Some(r#"{"name":"Ada"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let failed = sink.with_message("User creation failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].fields.get("email"), Some(&FieldValue::Bool(false)));

        let (status, body) = send(
            server.router(),
            Method::POST,
            "/api/users",
            Some(r#"{"name":"Ada","email":"ada@example.com"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.contains("ada@example.com"));

        let snapshot = server.registry().snapshot();
        assert!(snapshot.contains("app_requests_total{method=\"POST\",status=\"201\"} 1\n"));
        assert!(snapshot.contains("app_requests_total{method=\"POST\",status=\"400\"} 1\n"));
        assert!(snapshot.contains("app_errors_total 1\n"));
    }

    #[tokio::test]
    async fn test_health_sets_gauge() {
        let (server, sink) = server();
        assert_eq!(server.telemetry().health.value(), 0.0);

        let (status, body) = send(server.router(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let report: handlers::HealthReport = serde_json::from_str(&body).unwrap();
        assert_eq!(report.status, "OK");
        assert!(report.timestamp.ends_with('Z'));
        assert_eq!(server.telemetry().health.value(), 1.0);
        assert_eq!(sink.with_message("Health check").len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_error_outcomes_match_metrics() {
        let (server, sink) = server();
        for _ in 0..20 {
            send(server.router(), Method::GET, "/api/error", None).await;
        }

        let failures = sink.with_message("Simulated error").len() as u64;
        let passes = sink.with_message("Error test passed").len() as u64;
        assert_eq!(failures + passes, 20);

        let requests = server.telemetry().instrumentation.request_count();
        assert_eq!(requests, 20);
        assert_eq!(server.telemetry().instrumentation.error_count(), failures);
    }
}
