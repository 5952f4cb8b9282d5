//! MySQL status collector.
//!
//! - [`MysqlCollector`]: one poll cycle per tick, two records per cycle
//! - [`ConnectionManager`]: lazy, self-healing connection with ping probe
//! - [`aggregate`]: prefix-rule classification of status rows

pub mod aggregate;
mod collector;
mod config;
pub mod connection;
pub mod fetch;
pub mod submit;

pub use aggregate::{Bucket, CommandCounters, RULES, Rule, TrafficCounters, classify};
pub use collector::{CycleState, MysqlCollector};
pub use config::{DEFAULT_INTERVAL, DEFAULT_PORT, DEFAULT_TIMEOUT, MysqlConfig};
pub use connection::{ConnectionManager, Connector, Health, MysqlConnector, StatusConnection};
pub use fetch::{RawStatusRow, STATUS_QUERY, StatusRow, parse_counter};
pub use submit::{
    CounterGroup, MAX_RECORD_LEN, MetricGroup, MetricRecord, SUBMIT_INSTANCE, Submitter,
};
