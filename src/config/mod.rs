//! Configuration module for myscope.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Database settings (URL, channel capacity)
//! - MySQL collector definitions
//! - Collector include directory

mod app;
mod collector;
mod validation;

pub use app::{AppConfig, DatabaseConfig};
pub use collector::CollectorsConfig;
pub use validation::{ConfigError, expand_env_vars, parse_duration, parse_option};

// Re-export constants
pub use app::DEFAULT_DATABASE_URL;
