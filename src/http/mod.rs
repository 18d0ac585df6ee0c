//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → /metrics → handlers.rs (registry snapshot, not instrumented)
//!     → everything else
//!         → middleware/instrumentation.rs (observe request, exactly-once completion)
//!         → timeout
//!         → handlers.rs
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppServer, AppState};
