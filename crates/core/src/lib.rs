//! # digest-core
//!
//! Process-start concerns for the digest database tooling: reading connection
//! settings from the environment and installing the `tracing` subscriber.
//! Nothing in here touches the database.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigSource, DatabaseConfig, Settings};
pub use logging::{init_logging, LoggingConfig};
