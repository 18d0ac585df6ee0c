//! Periodic background task loop.
//!
//! # Responsibilities
//! - Tick on a fixed interval for the lifetime of the process
//! - Report each simulated run as an info or error event
//! - Survive a panicking tick and keep going
//!
//! # Design Decisions
//! - The first tick fires one full interval after start
//! - Late ticks are delayed, not bursted
//! - Only the event logger is shared with the rest of the process

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::observability::{EventLogger, Fields};
use crate::scheduler::policy::{BackgroundTaskRun, RandomPolicy, TickPolicy};

pub struct BackgroundScheduler {
    logger: EventLogger,
    interval: Duration,
    policy: Box<dyn TickPolicy>,
}

impl BackgroundScheduler {
    pub fn new(logger: EventLogger, interval: Duration, policy: Box<dyn TickPolicy>) -> Self {
        Self {
            logger,
            interval,
            policy,
        }
    }

    /// Scheduler with the seedable random policy described by `config`.
    pub fn from_config(logger: EventLogger, config: &SchedulerConfig) -> Self {
        let policy = RandomPolicy::new(
            config.tasks.clone(),
            config.failure_probability,
            config.seed,
        );
        Self::new(
            logger,
            Duration::from_secs(config.interval_secs.max(1)),
            Box::new(policy),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick and log its outcome.
    pub fn tick(&mut self) -> BackgroundTaskRun {
        let run = self.policy.next_run();
        let fields = Fields::new().with("task", &run.task);

        if run.failed() {
            self.logger.error("Background task failed", fields);
        } else {
            self.logger.info("Background task completed", fields);
        }
        run
    }

    /// Tick until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Background scheduler starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if catch_unwind(AssertUnwindSafe(|| self.tick())).is_err() {
                        tracing::error!("Background tick panicked, continuing");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Background scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
