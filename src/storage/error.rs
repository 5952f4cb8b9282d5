//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure, which can be
//! matched to determine the underlying cause (database, channel, bad record).

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to send command to writer actor.
    #[error("failed to send command to writer actor")]
    ChannelSend,

    /// Internal error (e.g., task join failure).
    #[error("internal error: {0}")]
    Internal(String),

    /// Record text does not match its data set.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// No data set is registered under the submitted name.
    #[error("unknown data set: {0}")]
    UnknownDataSet(String),
}
