//! myscope - MySQL status collector
//!
//! Periodically polls a MySQL server's `SHOW GLOBAL STATUS` counters,
//! classifies them into statement and traffic groups, and stores one
//! timestamped record per group per cycle. Usable as a library or through
//! the `myscope` binary.
//!
//! # Architecture
//!
//! - **Collectors**: scheduled [`Collector`]s driven by the [`CollectorRegistry`]
//! - **MySQL**: connection management, status fetch, aggregation and submission
//! - **Storage**: SQLite record sink with a single writer task
//! - **Config**: YAML application config and key/value collector options

pub mod collector;
pub mod config;
pub mod storage;

pub use collector::mysql::{CycleState, Health, MysqlCollector, MysqlConfig};
pub use collector::{Collector, CollectorError, CollectorRegistry, Schedule};
pub use config::{AppConfig, ConfigError};
pub use storage::{
    DataSet, MYSQL_COMMANDS, MYSQL_TRAFFIC, MetricSink, RecordReader, StorageBuilder,
    StorageError, StorageHandles, StorageWriter,
};
