//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → schema.rs (environment overrides: PORT, LOKI_URL)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to AppServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::AppConfig;
pub use schema::ListenerConfig;
pub use schema::LoggingConfig;
pub use schema::RemoteSinkConfig;
pub use schema::SchedulerConfig;
pub use schema::TimeoutConfig;
