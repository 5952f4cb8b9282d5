//! MySQL status collector.
//!
//! Polls `SHOW GLOBAL STATUS`, folds the rows into command and traffic
//! counters and submits one record per group every cycle.

use std::sync::Arc;

use strum_macros::{AsRefStr, Display};
use tokio::sync::Mutex;

use crate::collector::mysql::aggregate::aggregate;
use crate::collector::mysql::config::MysqlConfig;
use crate::collector::mysql::connection::{ConnectionManager, Connector, Health, MysqlConnector};
use crate::collector::mysql::fetch::fetch;
use crate::collector::mysql::submit::Submitter;
use crate::collector::{Collector, CollectorError, Schedule};
use crate::storage::MetricSink;

/// Lifecycle of the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CycleState {
    /// Startup probe not yet run.
    Uninitialized,
    /// Startup probe succeeded; ticks collect.
    Ready,
    /// Startup probe failed; ticks do nothing.
    Disabled,
}

struct Inner<C: Connector> {
    state: CycleState,
    connections: ConnectionManager<C>,
}

/// Collector for one MySQL server.
///
/// Connection state lives behind an async mutex, so overlapping ticks run
/// one after the other on the same connection.
pub struct MysqlCollector<C: Connector = MysqlConnector> {
    name: String,
    host: String,
    schedule: Schedule,
    submitter: Submitter,
    inner: Mutex<Inner<C>>,
}

impl<C: Connector> std::fmt::Debug for MysqlCollector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlCollector")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl MysqlCollector {
    /// Create a collector that connects with `sqlx`.
    ///
    /// # Errors
    /// `Config` if the configured cron expression is invalid.
    pub fn new(config: &MysqlConfig, sink: Arc<dyn MetricSink>) -> Result<Self, CollectorError> {
        Self::with_connector(config, MysqlConnector::new(config), sink)
    }
}

impl<C: Connector> MysqlCollector<C> {
    /// Create a collector with a custom [`Connector`].
    pub fn with_connector(
        config: &MysqlConfig,
        connector: C,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self, CollectorError> {
        Ok(Self {
            name: config.name.clone(),
            host: config.host.clone(),
            schedule: config.schedule()?,
            submitter: Submitter::new(sink),
            inner: Mutex::new(Inner {
                state: CycleState::Uninitialized,
                connections: ConnectionManager::new(connector).with_timeout(config.timeout),
            }),
        })
    }

    /// Replace the submitter, e.g. to change the record size limit.
    pub fn with_submitter(mut self, submitter: Submitter) -> Self {
        self.submitter = submitter;
        self
    }

    pub async fn state(&self) -> CycleState {
        self.inner.lock().await.state
    }

    pub async fn health(&self) -> Health {
        self.inner.lock().await.connections.health()
    }

    /// Run the startup probe once; later calls are no-ops.
    async fn start(&self, inner: &mut Inner<C>) -> Result<(), CollectorError> {
        if inner.state != CycleState::Uninitialized {
            return Ok(());
        }

        match inner.connections.acquire().await {
            Ok(_) => {
                inner.state = CycleState::Ready;
                tracing::info!(collector = %self.name, host = %self.host, "MySQL collector ready");
                Ok(())
            }
            Err(e) => {
                inner.state = CycleState::Disabled;
                tracing::error!(
                    collector = %self.name,
                    host = %self.host,
                    error = %e,
                    "Startup probe failed, collector disabled"
                );
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: Connector> Collector for MysqlCollector<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) -> Schedule {
        self.schedule.clone()
    }

    async fn init(&self) -> Result<(), CollectorError> {
        let mut inner = self.inner.lock().await;
        self.start(&mut inner).await
    }

    async fn collect(&self) -> Result<(), CollectorError> {
        let mut inner = self.inner.lock().await;
        self.start(&mut inner).await?;

        if inner.state == CycleState::Disabled {
            tracing::trace!(collector = %self.name, "Collector disabled, skipping");
            return Ok(());
        }

        let timeout = inner.connections.timeout();
        let conn = inner.connections.acquire().await?;
        let rows = match tokio::time::timeout(timeout, fetch(conn)).await {
            Ok(rows) => rows?,
            Err(_) => {
                inner.connections.invalidate();
                return Err(CollectorError::Query(format!(
                    "status query timed out after {timeout:?}"
                )));
            }
        };
        // Submission does not touch the connection
        drop(inner);

        let (commands, traffic) = aggregate(&rows);
        tracing::debug!(
            collector = %self.name,
            rows = rows.len(),
            ?commands,
            ?traffic,
            "Status aggregated"
        );

        let first = self.submitter.submit(&commands);
        let second = self.submitter.submit(&traffic);
        first.and(second)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::collector::mysql::connection::testing::{Script, ScriptedConnector};
    use crate::collector::mysql::submit::testing::RecordingSink;

    const SCENARIO: &[(&str, &str)] = &[
        ("Com_insert", "5"),
        ("Com_select", "10"),
        ("Com_stmt_prepare", "3"),
        ("Bytes_received", "100"),
        ("Bytes_sent", "50"),
        ("Threads_connected", "2"),
    ];

    fn collector(
        script: &Arc<Script>,
    ) -> (Arc<RecordingSink>, MysqlCollector<ScriptedConnector>) {
        let sink = Arc::new(RecordingSink::default());
        let collector = MysqlCollector::with_connector(
            &MysqlConfig::new("db.internal"),
            ScriptedConnector(Arc::clone(script)),
            sink.clone(),
        )
        .unwrap();
        (sink, collector)
    }

    #[tokio::test]
    async fn test_cycle_submits_both_groups() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);

        collector.init().await.unwrap();
        assert_eq!(collector.state().await, CycleState::Ready);

        collector.collect().await.unwrap();
        assert_eq!(sink.names(), vec!["mysql_commands", "mysql_traffic"]);
        assert_eq!(sink.values(), vec!["5:10:0:0:0", "100:50"]);
        assert!(sink.taken().iter().all(|s| s.instance == "-"));
    }

    #[tokio::test]
    async fn test_empty_status_submits_zeros() {
        let script = Script::with_rows(&[]);
        let (sink, collector) = collector(&script);
        collector.init().await.unwrap();

        collector.collect().await.unwrap();
        assert_eq!(sink.values(), vec!["0:0:0:0:0", "0:0"]);
    }

    #[tokio::test]
    async fn test_startup_failure_disables() {
        let script = Script::with_rows(SCENARIO);
        script.fail_next_connects(1);
        let (sink, collector) = collector(&script);

        assert!(collector.init().await.is_err());
        assert_eq!(collector.state().await, CycleState::Disabled);

        for _ in 0..3 {
            collector.collect().await.unwrap();
        }
        assert!(sink.taken().is_empty());
        assert_eq!(script.connects(), 1, "startup probe is never retried");
        assert_eq!(script.queries(), 0);
    }

    #[tokio::test]
    async fn test_tick_before_init_runs_probe() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        assert_eq!(collector.state().await, CycleState::Uninitialized);

        collector.collect().await.unwrap();
        assert_eq!(collector.state().await, CycleState::Ready);
        assert_eq!(sink.taken().len(), 2);

        // init after the fact does not probe again
        collector.init().await.unwrap();
        assert_eq!(script.connects(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_aborts_cycle() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        collector.init().await.unwrap();

        *script.rows.lock().unwrap() = None;
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectorError::Query(_)));
        assert!(sink.taken().is_empty());
        assert_eq!(collector.state().await, CycleState::Ready);
    }

    #[tokio::test]
    async fn test_undecodable_rows_abort_cycle() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        collector.init().await.unwrap();

        script.undecodable.store(true, Ordering::SeqCst);
        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectorError::ResultMaterialization(_)));
        assert!(sink.taken().is_empty());
        assert_eq!(collector.state().await, CycleState::Ready);

        script.undecodable.store(false, Ordering::SeqCst);
        collector.collect().await.unwrap();
        assert_eq!(sink.taken().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_query_times_out() {
        let script = Script::with_rows(SCENARIO);
        let mut config = MysqlConfig::new("db.internal");
        config.timeout = Duration::from_millis(100);
        let sink = Arc::new(RecordingSink::default());
        let collector = MysqlCollector::with_connector(
            &config,
            ScriptedConnector(Arc::clone(&script)),
            sink.clone(),
        )
        .unwrap();
        collector.init().await.unwrap();

        script.stall_queries.store(true, Ordering::SeqCst);
        let result = tokio::time::timeout(Duration::from_secs(2), collector.collect())
            .await
            .expect("cycle is bounded by the configured timeout");
        assert!(matches!(result, Err(CollectorError::Query(_))));
        assert!(sink.taken().is_empty());
        assert_eq!(collector.state().await, CycleState::Ready);
        assert_eq!(collector.health().await, Health::Broken);

        // The abandoned handle is replaced on the next tick
        script.stall_queries.store(false, Ordering::SeqCst);
        collector.collect().await.unwrap();
        assert_eq!(script.connects(), 2);
        assert_eq!(sink.taken().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_ping_does_not_block_later_ticks() {
        let script = Script::with_rows(SCENARIO);
        let mut config = MysqlConfig::new("db.internal");
        config.timeout = Duration::from_millis(100);
        let sink = Arc::new(RecordingSink::default());
        let collector = MysqlCollector::with_connector(
            &config,
            ScriptedConnector(Arc::clone(&script)),
            sink.clone(),
        )
        .unwrap();
        collector.init().await.unwrap();

        script.stall_pings.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(2), collector.collect())
            .await
            .expect("ping is bounded by the configured timeout")
            .unwrap();
        assert_eq!(script.connects(), 2);
        assert_eq!(sink.taken().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_commands_record_dropped_traffic_kept() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        // "<ts>:100:50" fits, "<ts>:5:10:0:0:0" does not
        let collector =
            collector.with_submitter(Submitter::new(sink.clone()).with_max_record_len(18));
        collector.init().await.unwrap();

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectorError::EncodingOverflow { limit: 18, .. }));
        assert_eq!(sink.names(), vec!["mysql_traffic"]);
        assert_eq!(sink.values(), vec!["100:50"]);
    }

    #[tokio::test]
    async fn test_reconnect_failure_skips_cycle_only() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        collector.init().await.unwrap();

        script.fail_next_pings(1);
        script.fail_next_connects(1);
        assert!(collector.collect().await.is_err());
        assert!(sink.taken().is_empty());
        assert_eq!(collector.health().await, Health::Broken);

        collector.collect().await.unwrap();
        assert_eq!(sink.taken().len(), 2);
        assert_eq!(collector.health().await, Health::Healthy);
    }

    #[tokio::test]
    async fn test_commands_failure_still_submits_traffic() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        collector.init().await.unwrap();
        sink.reject("mysql_commands");

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, CollectorError::Storage(_)));
        assert_eq!(sink.names(), vec!["mysql_traffic"]);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_share_one_connection() {
        let script = Script::with_rows(SCENARIO);
        let (sink, collector) = collector(&script);
        let collector = Arc::new(collector);

        let a = tokio::spawn({
            let c = Arc::clone(&collector);
            async move { c.collect().await }
        });
        let b = tokio::spawn({
            let c = Arc::clone(&collector);
            async move { c.collect().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(script.connects(), 1);
        assert_eq!(sink.taken().len(), 4);
    }

    #[test]
    fn test_cycle_state_display() {
        assert_eq!(CycleState::Disabled.to_string(), "disabled");
        assert_eq!(CycleState::Uninitialized.as_ref(), "uninitialized");
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let mut config = MysqlConfig::default();
        config.cron = Some("nope".to_string());
        let result = MysqlCollector::with_connector(
            &config,
            ScriptedConnector(Script::with_rows(&[])),
            Arc::new(RecordingSink::default()),
        );
        assert!(matches!(result, Err(CollectorError::Config(_))));
    }
}
