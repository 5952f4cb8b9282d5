//! Collector Layer
//!
//! Scheduled collectors that poll a source and hand encoded records to a
//! [`MetricSink`](crate::MetricSink).
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait for implementing data collectors
//! - [`Schedule`]: Execution schedule (interval or cron)
//! - [`CollectorRegistry`]: Manages collector lifecycle and graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use myscope::{CollectorRegistry, MysqlCollector, MysqlConfig, StorageBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let handles = StorageBuilder::new("sqlite://myscope.db").build().await?;
//! let config = MysqlConfig::new("127.0.0.1")
//!     .with_credentials("monitor", "${MYSQL_PASSWORD}")
//!     .with_interval(Duration::from_secs(10));
//! let collector = MysqlCollector::new(&config, Arc::new(handles.writer.clone()))?;
//!
//! let registry = CollectorRegistry::new().await?;
//! registry.spawn(collector).await?;
//! registry.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod mysql;
mod registry;
mod traits;

pub use registry::{CollectorRegistry, DEFAULT_SHUTDOWN_TIMEOUT, JobInfo, run_collection};
pub use traits::{Collector, CollectorError, MIN_INTERVAL, Schedule};
