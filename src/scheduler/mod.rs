//! Background task simulator.
//!
//! # Data Flow
//! ```text
//! interval timer (runner.rs)
//!     → TickPolicy picks task + outcome (policy.rs)
//!     → EventLogger: info "Background task completed" | error "Background task failed"
//! ```
//!
//! # Design Decisions
//! - Synthetic failures are log events only; the metric registry is untouched
//! - The policy is injectable so tests can force either branch

pub mod policy;
pub mod runner;

pub use policy::{BackgroundTaskRun, RandomPolicy, TaskOutcome, TickPolicy};
pub use runner::BackgroundScheduler;
