//! Tick outcome policies.
//!
//! A policy decides which synthetic task a tick runs and whether it fails.
//! The random policy is seedable so runs can be replayed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Outcome of one simulated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
}

/// Record of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundTaskRun {
    pub task: String,
    pub outcome: TaskOutcome,
}

impl BackgroundTaskRun {
    pub fn failed(&self) -> bool {
        self.outcome == TaskOutcome::Failed
    }
}

/// Chooses the task and outcome for each tick.
pub trait TickPolicy: Send {
    fn next_run(&mut self) -> BackgroundTaskRun;
}

/// Uniform task choice with an independent failure draw.
pub struct RandomPolicy {
    tasks: Vec<String>,
    failure_probability: f64,
    rng: StdRng,
}

impl RandomPolicy {
    /// `failure_probability` is clamped to [0, 1]; `seed` fixes the sequence.
    pub fn new(tasks: Vec<String>, failure_probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let failure_probability = if failure_probability.is_nan() {
            0.0
        } else {
            failure_probability.clamp(0.0, 1.0)
        };

        Self {
            tasks,
            failure_probability,
            rng,
        }
    }

    pub fn failure_probability(&self) -> f64 {
        self.failure_probability
    }
}

impl TickPolicy for RandomPolicy {
    fn next_run(&mut self) -> BackgroundTaskRun {
        let task = if self.tasks.is_empty() {
            "noop".to_string()
        } else {
            self.tasks[self.rng.gen_range(0..self.tasks.len())].clone()
        };
        let outcome = if self.rng.gen_bool(self.failure_probability) {
            TaskOutcome::Failed
        } else {
            TaskOutcome::Succeeded
        };

        BackgroundTaskRun { task, outcome }
    }
}
