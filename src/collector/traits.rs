//! Core collector traits and types.

use std::time::Duration;

use thiserror::Error;

use crate::StorageError;

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that can occur during collection.
///
/// Every variant aborts only the current collection cycle.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Could not establish a connection to the polled server.
    #[error("connection to '{host}' failed: {reason}")]
    ConnectionInit { host: String, reason: String },

    /// The server rejected the configured credentials.
    #[error("authentication as '{user}' failed: {reason}")]
    Authentication { user: String, reason: String },

    /// Liveness check on an existing connection failed.
    #[error("ping failed: {0}")]
    Probe(String),

    /// The status query could not be executed.
    #[error("status query failed: {0}")]
    Query(String),

    /// The status result set could not be read.
    #[error("failed to read status result: {0}")]
    ResultMaterialization(String),

    /// An encoded record exceeded the sink's size limit.
    #[error("encoded record is {len} bytes, limit is {limit}")]
    EncodingOverflow { len: usize, limit: usize },

    /// Failed to hand a record to storage.
    #[error("failed to submit record: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Schedule for collector execution.
///
/// Supports both fixed interval and cron-based scheduling.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fixed interval between collections.
    ///
    /// Interval is clamped to a minimum of 1 second.
    Interval(Duration),

    /// Cron expression for scheduled execution.
    ///
    /// Uses standard cron syntax: `sec min hour day month weekday` (6-field).
    /// Example: `"*/10 * * * * *"` = every 10 seconds
    Cron(String),
}

impl Schedule {
    /// Create an interval schedule.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn interval(duration: Duration) -> Self {
        if duration < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            Self::Interval(MIN_INTERVAL)
        } else {
            Self::Interval(duration)
        }
    }

    /// Create a cron schedule with immediate validation.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the cron expression is invalid.
    pub fn cron(expr: impl AsRef<str>) -> Result<Self, CollectorError> {
        use std::str::FromStr;

        let expr = expr.as_ref();
        cron::Schedule::from_str(expr)
            .map_err(|e| CollectorError::Config(format!("invalid cron expression: {e}")))?;

        Ok(Self::Cron(expr.to_string()))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(d) => write!(f, "every {:?}", d),
            Self::Cron(expr) => write!(f, "cron: {}", expr),
        }
    }
}

/// Core collector trait driven by the [`CollectorRegistry`](super::CollectorRegistry).
///
/// The registry calls [`init`](Collector::init) once when the collector is
/// registered and [`collect`](Collector::collect) on every scheduler tick.
/// Ticks for the same collector may overlap if a cycle outlasts the schedule,
/// so implementations serialize their own mutable state.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Unique identifier for this collector instance.
    fn name(&self) -> &str;

    /// Execution schedule (interval or cron).
    fn schedule(&self) -> Schedule;

    /// One-time startup hook.
    ///
    /// An error here is logged by the registry; the job is still scheduled
    /// and the collector decides how its ticks behave afterwards.
    async fn init(&self) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Perform one collection cycle.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the cycle completed, or was intentionally skipped
    /// - `Err(_)`: the cycle was aborted; nothing further is retried
    async fn collect(&self) -> Result<(), CollectorError>;
}
