//! User-facing storage facades.
//!
//! - `MetricSink`: the submission boundary collectors hand encoded records to
//! - `StorageWriter`: Non-blocking writes via MPSC, implements `MetricSink`
//! - `RecordReader`: Query stored records and the declared schema

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::DateTime;
use sqlx::{Row, SqlitePool};
use tokio::sync::{mpsc, oneshot};

use crate::storage::StorageError;
use crate::storage::actor::Command;
use crate::storage::schema::{data_set, quote_ident};
use crate::storage::types::{DataSet, RecordUpdate, StoredRecord};

// =============================================================================
// Constants
// =============================================================================

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 10_000;

// =============================================================================
// Sink
// =============================================================================

/// Destination for encoded metric records.
///
/// `name` selects the data set, `instance` labels the submitter and
/// `record` is `<timestamp>:<v1>:<v2>:...`. Implementations take ownership
/// of the record's content; the caller does not retry on error.
pub trait MetricSink: Send + Sync {
    /// Accept one encoded record.
    fn submit(&self, name: &str, instance: &str, record: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Writer
// =============================================================================

/// Non-blocking storage writer.
///
/// Uses `try_send`: records are dropped if the channel is full.
#[derive(Clone)]
pub struct StorageWriter {
    tx: mpsc::Sender<Command>,
    dropped_records: Arc<AtomicU64>,
}

impl std::fmt::Debug for StorageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWriter")
            .field("dropped_records", &self.dropped_records())
            .finish_non_exhaustive()
    }
}

impl StorageWriter {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self {
            tx,
            dropped_records: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total count of records dropped because the channel was full or closed.
    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    /// Queue a parsed record for insertion.
    pub fn insert(&self, update: RecordUpdate) -> Result<(), StorageError> {
        if self.tx.try_send(Command::Insert(update)).is_err() {
            tracing::warn!("Channel full, dropping record");
            self.dropped_records.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::ChannelSend);
        }
        Ok(())
    }

    /// Wait until every record queued before this call has been written.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .await
            .map_err(|_| StorageError::ChannelSend)?;
        ack_rx
            .await
            .map_err(|_| StorageError::Internal("writer actor dropped flush".to_string()))
    }

    pub(crate) async fn shutdown(&self) -> Result<(), StorageError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(ack_tx))
            .await
            .map_err(|_| StorageError::ChannelSend)?;
        ack_rx
            .await
            .map_err(|_| StorageError::Internal("writer actor dropped shutdown".to_string()))
    }
}

impl MetricSink for StorageWriter {
    fn submit(&self, name: &str, instance: &str, record: &str) -> Result<(), StorageError> {
        let ds = data_set(name).ok_or_else(|| StorageError::UnknownDataSet(name.to_string()))?;
        let update = RecordUpdate::parse(ds, instance, record)?;
        self.insert(update)
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reader for stored records.
#[derive(Clone)]
pub struct RecordReader {
    pool: SqlitePool,
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader").finish_non_exhaustive()
    }
}

impl RecordReader {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent records of a data set, newest first.
    ///
    /// `limit` defaults to 100 and is capped at 10,000.
    pub async fn latest(
        &self,
        ds: &DataSet,
        limit: Option<u32>,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let columns = ds
            .field_names()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT ts, instance, {columns} FROM {} ORDER BY ts DESC, rowid DESC LIMIT ?",
            quote_ident(ds.name)
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<StoredRecord, StorageError> {
                let ts: i64 = row.try_get("ts")?;
                let instance: String = row.try_get("instance")?;
                let values = (0..ds.len())
                    .map(|i| row.try_get::<i64, _>(i + 2).map(|v| u64::try_from(v).unwrap_or(0)))
                    .collect::<Result<Vec<_>, _>>()?;
                let ts = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                    StorageError::InvalidData(format!("timestamp out of range: {ts}"))
                })?;
                Ok(StoredRecord {
                    instance,
                    ts,
                    values,
                })
            })
            .collect()
    }

    /// Number of stored records in a data set.
    pub async fn count(&self, ds: &DataSet) -> Result<u64, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(ds.name));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Declared field definitions of a data set as persisted in the catalog,
    /// rendered as `DS:<name>:<KIND>:<heartbeat>:<min>:<max>`.
    pub async fn declared_sources(&self, name: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            "SELECT name, kind, heartbeat_secs, min_value, max_value
             FROM data_sources WHERE data_set = ? ORDER BY position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<String, StorageError> {
                let bound = |v: Option<i64>| v.map_or_else(|| "U".to_string(), |v| v.to_string());
                Ok(format!(
                    "DS:{}:{}:{}:{}:{}",
                    row.try_get::<String, _>("name")?,
                    row.try_get::<String, _>("kind")?,
                    row.try_get::<i64, _>("heartbeat_secs")?,
                    bound(row.try_get("min_value")?),
                    bound(row.try_get("max_value")?),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageBuilder;
    use crate::storage::schema::{MYSQL_COMMANDS, MYSQL_TRAFFIC};

    #[tokio::test]
    async fn test_writer_submit_and_read_back() {
        let handles = StorageBuilder::new("sqlite::memory:")
            .build()
            .await
            .unwrap();

        handles
            .writer
            .submit("mysql_commands", "-", "1700000000:1:2:3:4:5")
            .unwrap();
        handles
            .writer
            .submit("mysql_commands", "-", "1700000010:2:4:6:8:10")
            .unwrap();
        handles.writer.flush().await.unwrap();

        let records = handles
            .reader
            .latest(&MYSQL_COMMANDS, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ts.timestamp(), 1_700_000_010);
        assert_eq!(records[0].values, vec![2, 4, 6, 8, 10]);
        assert_eq!(records[1].instance, "-");

        assert_eq!(handles.reader.count(&MYSQL_TRAFFIC).await.unwrap(), 0);

        handles.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_rejects_unknown_and_malformed() {
        let handles = StorageBuilder::new("sqlite::memory:")
            .build()
            .await
            .unwrap();

        let err = handles
            .writer
            .submit("mysql_threads", "-", "1700000000:1")
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownDataSet(_)));

        let err = handles
            .writer
            .submit("mysql_traffic", "-", "1700000000:1:2:3")
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));

        handles.writer.flush().await.unwrap();
        assert_eq!(handles.reader.count(&MYSQL_TRAFFIC).await.unwrap(), 0);

        handles.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_declared_sources_catalog() {
        let handles = StorageBuilder::new("sqlite::memory:")
            .build()
            .await
            .unwrap();

        let sources = handles
            .reader
            .declared_sources("mysql_traffic")
            .await
            .unwrap();
        assert_eq!(
            sources,
            vec!["DS:incoming:COUNTER:25:0:U", "DS:outgoing:COUNTER:25:0:U"]
        );

        handles.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_drops_when_channel_full() {
        let (tx, _rx) = mpsc::channel(1);
        let writer = StorageWriter::new(tx);

        writer
            .submit("mysql_traffic", "-", "1700000000:1:2")
            .unwrap();
        let err = writer
            .submit("mysql_traffic", "-", "1700000001:1:2")
            .unwrap_err();
        assert!(matches!(err, StorageError::ChannelSend));
        assert_eq!(writer.dropped_records(), 1);
    }
}
