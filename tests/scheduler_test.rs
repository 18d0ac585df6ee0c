//! The scheduler shares the logger with live traffic but never the registry.

use std::sync::Arc;
use std::time::Duration;

use monitoring_app::observability::{EventLogger, Level, MemorySink};
use monitoring_app::scheduler::{BackgroundScheduler, RandomPolicy};
use monitoring_app::{AppConfig, AppServer, Shutdown};

#[tokio::test(start_paused = true)]
async fn test_scheduler_events_do_not_touch_metrics() {
    let sink = Arc::new(MemorySink::new());
    let mut config = AppConfig::default();
    config.scheduler.failure_probability = 1.0;
    config.scheduler.seed = Some(11);

    let server = AppServer::with_sinks(config.clone(), vec![sink.clone()]).unwrap();
    let before = application_metrics(&server.registry().snapshot());

    let scheduler = BackgroundScheduler::from_config(server.logger(), &config.scheduler);
    assert_eq!(scheduler.interval(), Duration::from_secs(30));

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.subscribe()));
    tokio::time::sleep(Duration::from_secs(91)).await;
    shutdown.trigger();
    handle.await.unwrap();

    let failed = sink.with_message("Background task failed");
    assert_eq!(failed.len(), 3);
    assert!(failed.iter().all(|e| e.level == Level::Error));
    assert!(sink.with_message("Background task completed").is_empty());
    assert_eq!(application_metrics(&server.registry().snapshot()), before);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let run = |seed| {
        let sink = Arc::new(MemorySink::new());
        let logger = EventLogger::new(vec![sink.clone()], Level::Info);
        let tasks = vec!["backup".to_string(), "cleanup".to_string(), "sync".to_string()];
        let mut scheduler = BackgroundScheduler::new(
            logger,
            Duration::from_secs(30),
            Box::new(RandomPolicy::new(tasks, 0.2, Some(seed))),
        );
        (0..50).map(|_| scheduler.tick()).collect::<Vec<_>>()
    };

    assert_eq!(run(5), run(5));
}

/// Snapshot lines excluding process samples, which move on their own.
fn application_metrics(snapshot: &str) -> Vec<String> {
    snapshot
        .lines()
        .filter(|line| !line.starts_with("process_"))
        .map(str::to_string)
        .collect()
}
