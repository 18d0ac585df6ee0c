//! Middleware applied to application routes.

pub mod instrumentation;

pub use instrumentation::{
    instrument_requests, CompletionGuard, RequestInstrumentation, RequestMetrics,
    RequestObservation, RequestPhase,
};
