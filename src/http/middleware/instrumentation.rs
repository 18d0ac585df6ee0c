//! Per-request instrumentation middleware.
//!
//! # Responsibilities
//! - Log every inbound request and count it in the display tally
//! - Observe the final status exactly once and update metrics and events
//!
//! # State Transitions
//! ```text
//! Started → Completed: response body reached its end, CompletionGuard::complete(status)
//! Started → Aborted:   guard dropped first (cancelled future, body error,
//!                      client gone mid-body, panic)
//! ```
//!
//! # Design Decisions
//! - Completion is owned by a drop guard, so it runs once on every exit path
//! - The guard travels inside the response body; a request is complete only
//!   once its last body frame has been produced
//! - Aborted requests emit a warn event and no counter increment
//! - The middleware never alters the response

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::request::request_id;
use crate::observability::{Counter, EventLogger, Fields, MetricRegistry, MetricsError};

/// Canonical request metrics.
#[derive(Clone)]
pub struct RequestMetrics {
    pub requests_total: Counter,
    pub errors_total: Counter,
}

impl RequestMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        Ok(Self {
            requests_total: registry.register_counter(
                "app_requests_total",
                "Total number of requests",
                &["method", "status"],
            )?,
            errors_total: registry.register_counter(
                "app_errors_total",
                "Total number of errors",
                &[],
            )?,
        })
    }
}

/// Metadata of one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub request_id: Option<String>,
    pub method: Method,
    pub url: String,
    pub client: Option<SocketAddr>,
    pub started: Instant,
}

impl RequestObservation {
    pub fn from_request(request: &Request<Body>) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        Self {
            request_id: request_id(request.headers()),
            method: request.method().clone(),
            url,
            client: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            started: Instant::now(),
        }
    }

    fn base_fields(&self) -> Fields {
        let mut fields = Fields::new()
            .with("method", self.method.as_str())
            .with("url", &self.url);
        if let Some(id) = &self.request_id {
            fields.insert("request_id", id);
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Started,
    Completed,
    Aborted,
}

/// Shared instrumentation state, one per process.
pub struct RequestInstrumentation {
    metrics: RequestMetrics,
    logger: EventLogger,
    // Display tallies for the landing page; the registry holds the canonical counts.
    request_count: AtomicU64,
    error_count: AtomicU64,
}

impl RequestInstrumentation {
    pub fn new(metrics: RequestMetrics, logger: EventLogger) -> Self {
        Self {
            metrics,
            logger,
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Record request entry and hand back the guard that owns its completion.
    pub fn begin(self: &Arc<Self>, observation: RequestObservation) -> CompletionGuard {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let mut fields = observation.base_fields();
        if let Some(client) = observation.client {
            fields.insert("ip", client.ip().to_string());
        }
        self.logger.info("Request received", fields);

        CompletionGuard {
            instrumentation: self.clone(),
            observation,
            phase: RequestPhase::Started,
        }
    }

    fn record_completion(&self, observation: &RequestObservation, status: StatusCode, elapsed: Duration) {
        let status_code = status.as_u16().to_string();
        if let Err(e) = self.metrics.requests_total.increment(&[
            ("method", observation.method.as_str()),
            ("status", status_code.as_str()),
        ]) {
            tracing::error!(error = %e, "Failed to record request metric");
        }

        let fields = observation
            .base_fields()
            .with("status", status.as_u16())
            .with("duration_ms", elapsed.as_secs_f64() * 1000.0);

        if status.as_u16() >= 400 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.metrics.errors_total.increment(&[]) {
                tracing::error!(error = %e, "Failed to record error metric");
            }
            self.logger.error("Request error", fields);
        } else {
            self.logger.info("Request completed", fields);
        }
    }

    fn record_abort(&self, observation: &RequestObservation, elapsed: Duration) {
        let fields = observation
            .base_fields()
            .with("duration_ms", elapsed.as_secs_f64() * 1000.0);
        self.logger.warn("Request aborted", fields);
    }
}

/// Owns a request's observation until it is completed or aborted.
pub struct CompletionGuard {
    instrumentation: Arc<RequestInstrumentation>,
    observation: RequestObservation,
    phase: RequestPhase,
}

impl CompletionGuard {
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn observation(&self) -> &RequestObservation {
        &self.observation
    }

    /// Finalize with the response status. Returns `false` if already finalized.
    pub fn complete(&mut self, status: StatusCode) -> bool {
        if self.phase != RequestPhase::Started {
            tracing::warn!(
                method = %self.observation.method,
                url = %self.observation.url,
                "Ignoring repeated request completion"
            );
            return false;
        }
        self.phase = RequestPhase::Completed;
        self.instrumentation.record_completion(
            &self.observation,
            status,
            self.observation.started.elapsed(),
        );
        true
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.phase == RequestPhase::Started {
            self.phase = RequestPhase::Aborted;
            self.instrumentation
                .record_abort(&self.observation, self.observation.started.elapsed());
        }
    }
}

/// Response body that completes its request after the final frame.
pub struct InstrumentedBody {
    inner: Body,
    completion: Option<(CompletionGuard, StatusCode)>,
}

impl InstrumentedBody {
    fn finish(&mut self) {
        if let Some((mut guard, status)) = self.completion.take() {
            guard.complete(status);
        }
    }
}

impl HttpBody for InstrumentedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => self.finish(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.finish(),
            // Dropping the unfinished guard records the abort.
            Poll::Ready(Some(Err(_))) => drop(self.completion.take()),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Middleware function wrapping every application route.
pub async fn instrument_requests(
    State(instrumentation): State<Arc<RequestInstrumentation>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut guard = instrumentation.begin(RequestObservation::from_request(&request));
    // HEAD response bodies are discarded unread.
    let bodyless = *request.method() == Method::HEAD;
    let response = next.run(request).await;
    let status = response.status();

    let (parts, body) = response.into_parts();
    if bodyless || body.is_end_stream() {
        guard.complete(status);
        return Response::from_parts(parts, body);
    }

    let body = InstrumentedBody {
        inner: body,
        completion: Some((guard, status)),
    };
    Response::from_parts(parts, Body::new(body))
}
