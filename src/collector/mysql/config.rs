//! MySQL collector configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{CollectorError, Schedule};
use crate::config::{ConfigError, parse_duration};

/// Default collection interval (10 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default connect timeout (5 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default server port.
pub const DEFAULT_PORT: u16 = 3306;

/// Configuration for one polled MySQL server.
///
/// The `Host`, `User`, `Password` and `Database` options may also be set one
/// key at a time through [`set_option`](Self::set_option).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlConfig {
    /// Collector name (default: "mysql").
    pub name: String,
    /// Enable this collector (default: true).
    pub enabled: bool,
    /// Server host (default: "localhost"). Empty also means localhost.
    pub host: String,
    /// Server port (default: 3306).
    pub port: u16,
    /// Unix socket path; takes precedence over host and port when set.
    pub socket: Option<String>,
    pub user: Option<String>,
    /// Supports `${VAR}` and `${VAR:-default}` expansion.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
    /// Collection interval (default: 10s). Ignored when `cron` is set.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Cron expression (6-field).
    pub cron: Option<String>,
    /// Timeout for connecting and for each ping or status query (default: 5s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            name: "mysql".to_string(),
            enabled: true,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            socket: None,
            user: None,
            password: None,
            database: None,
            interval: DEFAULT_INTERVAL,
            cron: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("interval", &self.interval)
            .field("cron", &self.cron)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MysqlConfig {
    /// Create a configuration for `host` with all other fields defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set the credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the collection interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Apply one key/value option.
    ///
    /// Keys are case-insensitive. `Host`, `User`, `Password` and `Database`
    /// take their value verbatim; `Port`, `Socket`, `Interval`, `Timeout`,
    /// `Cron` and `Name` are also recognized.
    ///
    /// # Errors
    /// `UnknownOption` for any other key, `ValidationError` if a numeric or
    /// duration value does not parse.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key.to_ascii_lowercase().as_str() {
            "host" => self.host = value.to_string(),
            "user" => self.user = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "database" => self.database = Some(value.to_string()),
            "port" => {
                self.port = value.trim().parse().map_err(|_| {
                    ConfigError::ValidationError(format!("invalid port: '{value}'"))
                })?;
            }
            "socket" => self.socket = Some(value.to_string()),
            "interval" => {
                self.interval = parse_duration(value)
                    .map_err(|e| ConfigError::ValidationError(format!("interval: {e}")))?;
            }
            "timeout" => {
                self.timeout = parse_duration(value)
                    .map_err(|e| ConfigError::ValidationError(format!("timeout: {e}")))?;
            }
            "cron" => self.cron = Some(value.to_string()),
            "name" => self.name = value.to_string(),
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// Execution schedule: the cron expression if set, otherwise the interval.
    pub fn schedule(&self) -> Result<Schedule, CollectorError> {
        match &self.cron {
            Some(expr) => Schedule::cron(expr),
            None => Ok(Schedule::interval(self.interval)),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "mysql collector name cannot be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "mysql collector '{}': timeout must be positive",
                self.name
            )));
        }
        self.schedule().map_err(|e| {
            ConfigError::ValidationError(format!("mysql collector '{}': {}", self.name, e))
        })?;
        Ok(())
    }
}
