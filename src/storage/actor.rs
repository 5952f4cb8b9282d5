//! Writer actor with a dedicated task and MPSC channel.
//!
//! Single-writer pattern: one task owns all record inserts and processes
//! commands in arrival order, so a `Flush` acknowledgement implies every
//! earlier insert has been attempted.

use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::storage::StorageError;
use crate::storage::schema::quote_ident;
use crate::storage::types::{DataSet, RecordUpdate};

// =============================================================================
// Commands
// =============================================================================

/// Commands sent to the writer actor.
#[derive(Debug)]
pub enum Command {
    /// Insert one record into its data set table.
    Insert(RecordUpdate),
    /// Acknowledge once all previously queued commands are processed.
    Flush(oneshot::Sender<()>),
    /// Graceful shutdown.
    Shutdown(oneshot::Sender<()>),
}

// =============================================================================
// Actor
// =============================================================================

/// Database writer actor.
///
/// Records arrive at a low, fixed rate (one per data set per cycle), so each
/// insert is written immediately rather than batched.
pub struct DbActor {
    pool: SqlitePool,
    rx: mpsc::Receiver<Command>,
}

impl DbActor {
    /// Spawn the writer actor task.
    ///
    /// Returns the task handle and the command sender.
    pub fn spawn(
        pool: SqlitePool,
        channel_capacity: usize,
    ) -> (JoinHandle<()>, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let actor = DbActor { pool, rx };
        let handle = tokio::spawn(actor.run());
        (handle, tx)
    }

    async fn run(mut self) {
        tracing::info!("DbActor started");

        while let Some(cmd) = self.rx.recv().await {
            if self.handle_command(cmd).await {
                break;
            }
        }

        tracing::info!("DbActor stopped");
    }

    async fn handle_command(&self, cmd: Command) -> bool {
        match cmd {
            Command::Insert(update) => {
                if let Err(e) = self.insert(&update).await {
                    tracing::error!(
                        error = %e,
                        data_set = update.data_set.name,
                        ts = update.ts,
                        "Record insert failed"
                    );
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => {
                tracing::info!("DbActor shutting down");
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    async fn insert(&self, update: &RecordUpdate) -> Result<(), StorageError> {
        let sql = insert_sql(update.data_set);
        let mut query = sqlx::query(&sql)
            .bind(update.ts)
            .bind(update.instance.clone());
        for value in &update.values {
            query = query.bind(to_column(*value));
        }
        query.execute(&self.pool).await?;

        tracing::debug!(
            data_set = update.data_set.name,
            ts = update.ts,
            "Record inserted"
        );
        Ok(())
    }
}

/// SQLite integers are signed; counters beyond `i64::MAX` are clamped.
pub(crate) fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn insert_sql(ds: &DataSet) -> String {
    let columns = ds
        .field_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; ds.len()].join(", ");
    format!(
        "INSERT INTO {} (ts, instance, {columns}) VALUES (?, ?, {placeholders})",
        quote_ident(ds.name)
    )
}
