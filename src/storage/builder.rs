//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing all storage facades.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tokio::task::JoinHandle;

use crate::storage::StorageError;
use crate::storage::actor::DbActor;
use crate::storage::schema::init_schema;
use crate::storage::{RecordReader, StorageWriter};

/// Default channel capacity for writer commands.
///
/// Two records are queued per collector per cycle, so this covers
/// several minutes of backlog for a handful of collectors.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Maximum connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Timeout for acquiring a pooled connection.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for constructing the storage layer.
pub struct StorageBuilder {
    url: String,
    channel_capacity: usize,
    max_connections: u32,
}

impl StorageBuilder {
    /// Create a new storage builder.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `sqlite:data/myscope.db` or
    /// `sqlite::memory:`. The database file is created if missing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the channel capacity for writer commands.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the maximum number of pooled connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Build the storage layer and return handles.
    ///
    /// Must be called from within a Tokio runtime; the writer actor is
    /// spawned as a task.
    pub async fn build(self) -> Result<StorageHandles, StorageError> {
        if self.channel_capacity == 0 {
            return Err(StorageError::Internal(
                "channel capacity must be positive".to_string(),
            ));
        }

        let options = SqliteConnectOptions::from_str(&self.url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT);
        if self.url.contains(":memory:") {
            // The database lives only as long as its connection
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        init_schema(&pool).await?;

        let (actor_handle, tx) = DbActor::spawn(pool.clone(), self.channel_capacity);
        tracing::info!(url = %self.url, "Storage initialized");

        Ok(StorageHandles {
            writer: StorageWriter::new(tx),
            reader: RecordReader::new(pool.clone()),
            pool,
            actor_handle: Some(actor_handle),
        })
    }
}

/// Handles to all storage layer facades.
pub struct StorageHandles {
    /// Record writer; also the collectors' [`MetricSink`](crate::MetricSink).
    pub writer: StorageWriter,
    /// Facade for reading stored records.
    pub reader: RecordReader,
    pool: SqlitePool,
    actor_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles")
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl StorageHandles {
    /// Gracefully shutdown the storage layer.
    ///
    /// Queued records are written before the actor stops, then the pool is closed.
    pub async fn shutdown(mut self) -> Result<(), StorageError> {
        self.writer.shutdown().await?;

        if let Some(handle) = self.actor_handle.take() {
            handle
                .await
                .map_err(|e| StorageError::Internal(format!("failed to join writer actor: {e}")))?;
        }

        self.pool.close().await;
        tracing::info!("Storage shut down");
        Ok(())
    }
}
