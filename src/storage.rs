//! Storage Layer
//!
//! SQLite-backed time-series storage for metric records:
//! - **Writer**: Async task with exclusive writes using tokio mpsc channel
//! - **Reader**: Pooled reads of stored records and the declared schema
//!
//! # Components
//!
//! - [`MetricSink`]: Submission boundary for encoded records
//! - [`StorageWriter`]: Channel-backed sink implementation
//! - [`RecordReader`]: Read facade
//! - [`StorageBuilder`] / [`StorageHandles`]: Initialization and lifecycle management
//! - [`DataSet`]: Fixed record schemas (`mysql_commands`, `mysql_traffic`)

mod actor;
mod builder;
mod error;
mod facades;
pub mod schema;
mod types;

pub use builder::{DEFAULT_CHANNEL_CAPACITY, StorageBuilder, StorageHandles};
pub use error::StorageError;
pub use facades::{MetricSink, RecordReader, StorageWriter};
pub use schema::{MYSQL_COMMANDS, MYSQL_TRAFFIC};
pub use types::{DataSet, DataSource, DataSourceKind, RecordUpdate, StoredRecord};
