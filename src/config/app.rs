//! Application configuration structures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::DEFAULT_CHANNEL_CAPACITY;

use super::collector::CollectorsConfig;
use super::validation::ConfigError;

// =============================================================================
// Constants
// =============================================================================

/// Default storage location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://myscope.db";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Record storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL (default: "sqlite://myscope.db").
    #[serde(default = "default_database_url")]
    pub url: String,

    /// MPSC channel capacity for write operations (default: 1024).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Collector configurations grouped by type.
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// Path to a directory with additional collector config files.
    #[serde(default)]
    pub collector_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database url cannot be empty".to_string(),
            ));
        }

        if self.database.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "database channel_capacity must be positive".to_string(),
            ));
        }

        self.collectors.validate()?;

        Ok(())
    }

    /// Load configuration including collector_path directory.
    ///
    /// If `collector_path` is specified, scans the directory for YAML files
    /// and merges their collector configurations.
    pub fn load_with_collector_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;

        if let Some(ref collector_dir) = config.collector_path {
            let additional = CollectorsConfig::load_from_dir(collector_dir)?;
            config.collectors = config.collectors.merge(additional);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::collector::mysql::MysqlConfig;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://myscope.db");
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_config_validation_valid() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "sqlite://./test.db".to_string(),
                channel_capacity: 16,
            },
            collectors: CollectorsConfig {
                mysql: vec![MysqlConfig::new("127.0.0.1")],
            },
            collector_path: None,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let config = AppConfig {
            database: DatabaseConfig {
                channel_capacity: 0,
                ..DatabaseConfig::default()
            },
            ..AppConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("channel_capacity"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
database:
  url: "sqlite::memory:"
collectors:
  mysql:
    - name: primary
      host: 10.0.0.5
      user: monitor
    - name: replica
      host: 10.0.0.6
      cron: "*/30 * * * * *"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.collectors.mysql.len(), 2);
        assert_eq!(config.collectors.mysql[1].cron.as_deref(), Some("*/30 * * * * *"));
    }

    #[test]
    fn test_load_with_collector_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "mysql:\n  - name: extra\n    host: 10.0.0.9\n",
        )
        .unwrap();

        let main = dir.path().join("main.yml.conf");
        std::fs::write(
            &main,
            format!(
                "collector_path: {}\ncollectors:\n  mysql:\n    - name: primary\n",
                dir.path().display()
            ),
        )
        .unwrap();

        let config = AppConfig::load_with_collector_path(&main).unwrap();
        let names: Vec<_> = config.collectors.mysql.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["primary", "extra"]);
    }
}
