//! Lazy, self-healing connection to the polled server.
//!
//! [`ConnectionManager`] owns at most one live connection. Each
//! [`acquire`](ConnectionManager::acquire) either returns a handle that just
//! passed a ping or makes exactly one fresh connection attempt.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::{ConnectOptions, Row};
use strum_macros::{AsRefStr, Display};

use crate::collector::CollectorError;
use crate::collector::mysql::config::{DEFAULT_TIMEOUT, MysqlConfig};
use crate::collector::mysql::fetch::RawStatusRow;
use crate::config::expand_env_vars;

/// Server error numbers that mean the credentials were rejected
/// (`ER_DBACCESS_DENIED_ERROR`, `ER_ACCESS_DENIED_ERROR`, `ER_ACCESS_DENIED_NO_PASSWORD_ERROR`).
const ACCESS_DENIED_ERRNOS: [u16; 3] = [1044, 1045, 1698];

/// Health of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Health {
    /// No connection has been attempted yet.
    Unchecked,
    /// A handle exists and its last connect or ping succeeded.
    Healthy,
    /// The last connect or ping failed; no handle is held.
    Broken,
}

/// Opens authenticated connections to the polled server.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Live connection type.
    type Connection: StatusConnection;

    /// Connect and authenticate with the configured credentials.
    async fn connect(&self) -> Result<Self::Connection, CollectorError>;
}

/// Operations the collector needs from a live connection.
#[async_trait::async_trait]
pub trait StatusConnection: Send + 'static {
    /// Lightweight liveness check.
    async fn ping(&mut self) -> Result<(), CollectorError>;

    /// Run `query` and materialize every `(name, value)` row.
    async fn query_status(&mut self, query: &str) -> Result<Vec<RawStatusRow>, CollectorError>;
}

/// Owns the single connection handle and its health state.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    handle: Option<C::Connection>,
    health: Health,
    timeout: Duration,
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("health", &self.health)
            .field("connected", &self.handle.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager; no connection is opened until the first `acquire`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            handle: None,
            health: Health::Unchecked,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every ping, and every query the caller runs, by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current health state.
    pub fn health(&self) -> Health {
        self.health
    }

    /// Time budget for one operation on the held connection.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drop the held handle; the next `acquire` reconnects.
    ///
    /// Used when an operation was abandoned mid-flight and the handle's
    /// protocol state is unknown.
    pub fn invalidate(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!("Connection discarded");
        }
        self.health = Health::Broken;
    }

    /// Return a live connection.
    ///
    /// A `Healthy` handle is pinged and reused if the ping succeeds. Otherwise
    /// (never connected, previously broken, or ping failed) one connection
    /// attempt is made. The handle is kept open between calls.
    ///
    /// # Errors
    /// Returns `ConnectionInit` or `Authentication` if the connection attempt
    /// fails; the state is then `Broken` and the caller should not retry
    /// within the same cycle.
    pub async fn acquire(&mut self) -> Result<&mut C::Connection, CollectorError> {
        if self.health == Health::Healthy && self.probe().await {
            return self
                .handle
                .as_mut()
                .ok_or_else(|| CollectorError::Probe("healthy state without a handle".to_string()));
        }
        self.connect().await
    }

    /// Ping the held handle, discarding it on failure.
    async fn probe(&mut self) -> bool {
        let Some(conn) = self.handle.as_mut() else {
            self.health = Health::Broken;
            return false;
        };

        let result = match tokio::time::timeout(self.timeout, conn.ping()).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::Probe(format!(
                "ping timed out after {:?}",
                self.timeout
            ))),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Connection ping failed, reconnecting");
                self.handle = None;
                self.health = Health::Broken;
                false
            }
        }
    }

    async fn connect(&mut self) -> Result<&mut C::Connection, CollectorError> {
        match self.connector.connect().await {
            Ok(conn) => {
                self.health = Health::Healthy;
                tracing::debug!("Connection established");
                Ok(self.handle.insert(conn))
            }
            Err(e) => {
                tracing::error!(error = %e, "Connection attempt failed");
                self.handle = None;
                self.health = Health::Broken;
                Err(e)
            }
        }
    }
}

// =============================================================================
// MySQL implementation
// =============================================================================

/// [`Connector`] backed by `sqlx` MySQL connections.
#[derive(Clone)]
pub struct MysqlConnector {
    options: MySqlConnectOptions,
    host: String,
    user: String,
    timeout: Duration,
}

impl std::fmt::Debug for MysqlConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConnector")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MysqlConnector {
    /// Build connect options from a collector configuration.
    ///
    /// `${VAR}` references in the password are expanded from the environment.
    /// An empty host means `localhost`.
    pub fn new(config: &MysqlConfig) -> Self {
        let host = if config.host.is_empty() {
            "localhost"
        } else {
            config.host.as_str()
        };
        let mut options = MySqlConnectOptions::new().host(host).port(config.port);

        if let Some(socket) = &config.socket {
            options = options.socket(socket);
        }
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(&expand_env_vars(password));
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        Self {
            options,
            host: host.to_string(),
            user: config.user.clone().unwrap_or_default(),
            timeout: config.timeout,
        }
    }

    fn classify(&self, err: sqlx::Error) -> CollectorError {
        if let sqlx::Error::Database(db_err) = &err
            && let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>()
            && ACCESS_DENIED_ERRNOS.contains(&mysql_err.number())
        {
            return CollectorError::Authentication {
                user: self.user.clone(),
                reason: err.to_string(),
            };
        }
        CollectorError::ConnectionInit {
            host: self.host.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for MysqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, CollectorError> {
        match tokio::time::timeout(self.timeout, self.options.connect()).await {
            Ok(Ok(conn)) => {
                tracing::info!(host = %self.host, user = %self.user, "Connected to MySQL");
                Ok(conn)
            }
            Ok(Err(e)) => Err(self.classify(e)),
            Err(_) => Err(CollectorError::ConnectionInit {
                host: self.host.clone(),
                reason: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

#[async_trait::async_trait]
impl StatusConnection for MySqlConnection {
    async fn ping(&mut self) -> Result<(), CollectorError> {
        sqlx::Connection::ping(self)
            .await
            .map_err(|e| CollectorError::Probe(e.to_string()))
    }

    async fn query_status(&mut self, query: &str) -> Result<Vec<RawStatusRow>, CollectorError> {
        let rows = sqlx::query(query)
            .fetch_all(&mut *self)
            .await
            .map_err(|e| CollectorError::Query(e.to_string()))?;

        rows.iter().map(decode_status_row).collect()
    }
}

/// Status values are text on the wire; read both columns as bytes so
/// binary and character collations decode alike.
fn decode_status_row(row: &MySqlRow) -> Result<RawStatusRow, CollectorError> {
    let key: Vec<u8> = row
        .try_get(0)
        .map_err(|e| CollectorError::ResultMaterialization(e.to_string()))?;
    let value: Option<Vec<u8>> = row
        .try_get(1)
        .map_err(|e| CollectorError::ResultMaterialization(e.to_string()))?;

    Ok(RawStatusRow {
        key: String::from_utf8_lossy(&key).into_owned(),
        value: value.map(|v| String::from_utf8_lossy(&v).into_owned()),
    })
}
