//! End-to-end tests of the observability pipeline over real HTTP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use monitoring_app::config::RemoteSinkConfig;
use monitoring_app::observability::{EventSink, FieldValue, Level, LokiSink};
use monitoring_app::AppConfig;

mod common;

#[tokio::test]
async fn test_single_successful_request() {
    let server = common::start_server().await;
    let client = common::client();

    let res = client.get(server.url("/api/users")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let snapshot = server.registry.snapshot();
    assert!(snapshot.contains("app_requests_total{method=\"GET\",status=\"200\"} 1\n"));
    assert!(snapshot.contains("app_errors_total 0\n"));

    let completed = server.sink.with_message("Request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].level, Level::Info);
    assert_eq!(completed[0].fields.get("url"), Some(&FieldValue::from("/api/users")));

    let received = server.sink.with_message("Request received");
    assert_eq!(received[0].fields.get("ip"), Some(&FieldValue::from("127.0.0.1")));

    server.stop().await;
}

#[tokio::test]
async fn test_client_request_id_is_kept() {
    let server = common::start_server().await;
    let client = common::client();

    let res = client
        .get(server.url("/health"))
        .header("x-request-id", "trace-me-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "trace-me-42");

    let completed = server.sink.with_message("Request completed");
    assert_eq!(
        completed[0].fields.get("request_id"),
        Some(&FieldValue::from("trace-me-42"))
    );

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_requests_counted_exactly() {
    let server = common::start_server().await;
    let client = common::client();
    let per_kind = 25;

    let mut tasks = Vec::new();
    for i in 0..per_kind * 4 {
        let client = client.clone();
        let base = format!("http://{}", server.addr);
        tasks.push(tokio::spawn(async move {
            let res = match i % 4 {
                0 => client.get(format!("{}/api/users", base)).send().await,
                1 => client.get(format!("{}/missing/{}", base, i)).send().await,
                2 => {
                    client
                        .post(format!("{}/api/users", base))
                        .json(&serde_json::json!({ "name": "Ada", "email": "ada@example.com" }))
                        .send()
                        .await
                }
                _ => {
                    client
                        .post(format!("{}/api/users", base))
                        .json(&serde_json::json!({ "name": "Ada" }))
                        .send()
                        .await
                }
            };
            res.unwrap().status().as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), per_kind);
    assert_eq!(statuses.iter().filter(|s| **s == 404).count(), per_kind);
    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), per_kind);
    assert_eq!(statuses.iter().filter(|s| **s == 400).count(), per_kind);

    let snapshot = server.registry.snapshot();
    for line in [
        "app_requests_total{method=\"GET\",status=\"200\"} 25\n",
        "app_requests_total{method=\"GET\",status=\"404\"} 25\n",
        "app_requests_total{method=\"POST\",status=\"201\"} 25\n",
        "app_requests_total{method=\"POST\",status=\"400\"} 25\n",
        "app_errors_total 50\n",
    ] {
        assert!(snapshot.contains(line), "missing `{}` in:\n{}", line.trim(), snapshot);
    }

    assert_eq!(server.sink.with_message("Request error").len(), 50);
    assert_eq!(server.sink.with_message("Request completed").len(), 50);
    assert!(server.sink.with_message("Request aborted").is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_metrics_endpoint_stable_between_scrapes() {
    let server = common::start_server().await;
    let client = common::client();

    client.get(server.url("/api/users")).send().await.unwrap();

    let res = client.get(server.url("/metrics")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain; version=0.0.4");
    let body = res.text().await.unwrap();
    assert!(body.contains("# TYPE app_requests_total counter"));
    if cfg!(target_os = "linux") {
        assert!(body.contains("# TYPE process_resident_memory_bytes gauge"));
    }

    // Scrapes are not instrumented, so they do not change application metrics.
    let strip_process = |text: &str| -> String {
        text.lines()
            .filter(|l| !l.starts_with("process_"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let again = client.get(server.url("/metrics")).send().await.unwrap().text().await.unwrap();
    assert_eq!(strip_process(&body), strip_process(&again));
    assert_eq!(
        strip_process(&server.registry.snapshot()),
        strip_process(&server.registry.snapshot())
    );

    server.stop().await;
}

#[tokio::test]
async fn test_health_reports_and_sets_gauge() {
    let server = common::start_server().await;
    let client = common::client();

    let body: serde_json::Value = client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "OK");
    assert!(body["uptime_seconds"].is_number());
    assert!(body["memory"]["rss_bytes"].is_number());
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    assert!(server.registry.snapshot().contains("app_health_status 1\n"));

    server.stop().await;
}

#[tokio::test]
async fn test_unreachable_remote_sink_does_not_slow_requests() {
    let remote = RemoteSinkConfig {
        enabled: true,
        url: "http://127.0.0.1:9".to_string(),
        timeout_ms: 200,
        queue_capacity: 4,
        ..RemoteSinkConfig::default()
    };
    let loki: Arc<dyn EventSink> = Arc::new(LokiSink::spawn(&remote).unwrap());

    let mut config = AppConfig::default();
    config.scheduler.enabled = false;
    let server = common::start_server_with(config, vec![loki]).await;
    let client = common::client();

    let start = Instant::now();
    for _ in 0..20 {
        let res = client.get(server.url("/api/users")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(server.sink.with_message("Request completed").len(), 20);

    server.stop().await;
}
