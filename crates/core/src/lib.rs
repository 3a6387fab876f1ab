//! Shared process plumbing for the Steward runtime: layered configuration
//! and logging bootstrap.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use logging::LoggingError;
