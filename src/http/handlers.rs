//! Route handlers.
//!
//! Everything here is an application route that reports through the event
//! logger; request-level metrics come from the instrumentation middleware.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::metrics::EXPOSITION_CONTENT_TYPE;
use crate::observability::process::MemoryUsage;
use crate::observability::Fields;

/// `GET /metrics`: Prometheus text exposition of the registry.
pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.telemetry.registry.snapshot(),
    )
        .into_response()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_seconds: f64,
    pub memory: MemoryUsage,
    pub timestamp: String,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let report = HealthReport {
        status: "OK".to_string(),
        uptime_seconds: state.telemetry.started.elapsed().as_secs_f64(),
        memory: state.telemetry.process.memory(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    state.telemetry.logger.info(
        "Health check",
        Fields::new()
            .with("status", report.status.as_str())
            .with("uptime_seconds", report.uptime_seconds)
            .with("rss_bytes", report.memory.rss_bytes),
    );
    state.telemetry.health.set(1.0);

    Json(report)
}

/// `GET /`: landing page with live tallies.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let instrumentation = &state.telemetry.instrumentation;
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Monitoring App</title></head>
<body>
  <h1>Monitoring App</h1>
  <p>System Healthy</p>
  <ul>
    <li><a href="/metrics">Prometheus Metrics</a></li>
    <li><a href="/health">Health Check</a></li>
    <li><a href="/api/users">API Users</a></li>
    <li><a href="/api/error">Test Error</a></li>
  </ul>
  <p>Requests: {requests} | Errors: {errors} | Uptime: {uptime}s</p>
</body>
</html>"#,
        requests = instrumentation.request_count(),
        errors = instrumentation.error_count(),
        uptime = state.telemetry.started.elapsed().as_secs(),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

fn sample_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "John Doe".into(),
            email: "john@example.com".into(),
        },
        User {
            id: 2,
            name: "Jane Smith".into(),
            email: "jane@example.com".into(),
        },
    ]
}

/// `GET /api/users`
pub async fn list_users(State(state): State<AppState>) -> Json<serde_json::Value> {
    let users = sample_users();
    state
        .telemetry
        .logger
        .info("Users requested", Fields::new().with("count", users.len()));
    Json(json!({ "count": users.len(), "users": users }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// `POST /api/users`
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUser>,
) -> Response {
    let name = body.name.filter(|n| !n.is_empty());
    let email = body.email.filter(|e| !e.is_empty());

    let (name, email) = match (name, email) {
        (Some(name), Some(email)) => (name, email),
        (name, email) => {
            state.telemetry.logger.error(
                "User creation failed",
                Fields::new()
                    .with("name", name.is_some())
                    .with("email", email.is_some()),
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Name and email required" })),
            )
                .into_response();
        }
    };

    let user = User {
        id: Utc::now().timestamp_millis().max(0) as u64,
        name,
        email,
    };
    state
        .telemetry
        .logger
        .info("User created", Fields::new().with("user_id", user.id));

    (StatusCode::CREATED, Json(json!({ "user": user }))).into_response()
}

/// `GET /api/error`: fails half of the time.
pub async fn simulated_error(State(state): State<AppState>) -> Response {
    if fastrand::bool() {
        state
            .telemetry
            .logger
            .error("Simulated error", Fields::new().with("endpoint", "/api/error"));
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Simulated error" })),
        )
            .into_response();
    }

    state.telemetry.logger.info("Error test passed", Fields::new());
    Json(json!({ "message": "No error this time" })).into_response()
}

/// Fallback for unknown routes.
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    state
        .telemetry
        .logger
        .warn("404 Not Found", Fields::new().with("url", &path));

    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "path": path })),
    )
        .into_response()
}
