//! Collector configuration structures.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collector::mysql::MysqlConfig;

use super::validation::ConfigError;

/// Collectors configuration grouped by type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// MySQL status collectors.
    #[serde(default)]
    pub mysql: Vec<MysqlConfig>,
}

impl CollectorsConfig {
    /// Merge another CollectorsConfig into this one.
    #[must_use]
    pub fn merge(mut self, other: CollectorsConfig) -> Self {
        self.mysql.extend(other.mysql);
        self
    }

    /// Validate all collector configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_names = HashSet::new();

        for mysql in &self.mysql {
            mysql.validate()?;
            if !seen_names.insert(&mysql.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate collector name: '{}'",
                    mysql.name
                )));
            }
        }

        Ok(())
    }

    /// Load collector configurations from all YAML files in a directory.
    pub fn load_from_dir(dir_path: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(dir_path);
        if !dir.exists() {
            return Err(ConfigError::ValidationError(format!(
                "collector_path '{}' does not exist",
                dir_path
            )));
        }
        if !dir.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "collector_path '{}' is not a directory",
                dir_path
            )));
        }

        let mut paths = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        // Deterministic merge order
        paths.sort();

        let mut merged = Self::default();
        for path in paths {
            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "yaml" && ext != "yml" {
                continue;
            }

            tracing::debug!("Loading collector config from: {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let file_config: Self = serde_yaml::from_str(&content).map_err(|e| {
                ConfigError::ValidationError(format!("failed to parse '{}': {}", path.display(), e))
            })?;

            merged = merged.merge(file_config);
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collectors_config_merge() {
        let config1 = CollectorsConfig {
            mysql: vec![MysqlConfig::new("10.0.0.1")],
        };
        let config2 = CollectorsConfig {
            mysql: vec![MysqlConfig::new("10.0.0.2")],
        };

        let merged = config1.merge(config2);
        assert_eq!(merged.mysql.len(), 2);
        assert_eq!(merged.mysql[1].host, "10.0.0.2");
    }

    #[test]
    fn test_collectors_config_validate_duplicate_names() {
        let config = CollectorsConfig {
            mysql: vec![MysqlConfig::new("10.0.0.1"), MysqlConfig::new("10.0.0.2")],
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_collectors_config_validate_empty_name() {
        let mut mysql = MysqlConfig::default();
        mysql.name = String::new();

        let config = CollectorsConfig { mysql: vec![mysql] };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_load_from_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "mysql:\n  - name: a\n    host: 10.0.0.1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "mysql:\n  - name: b\n    host: 10.0.0.2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

        let config = CollectorsConfig::load_from_dir(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = config.mysql.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_load_from_missing_dir() {
        let result = CollectorsConfig::load_from_dir("/nonexistent/myscope/collectors");
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }
}
