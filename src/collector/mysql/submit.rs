//! Record encoding and hand-off to the metric sink.

use std::sync::Arc;

use chrono::Utc;

use crate::collector::CollectorError;
use crate::collector::mysql::aggregate::{CommandCounters, TrafficCounters};
use crate::storage::{DataSet, MYSQL_COMMANDS, MYSQL_TRAFFIC, MetricSink};

/// Largest encoded record the sink accepts, in bytes.
pub const MAX_RECORD_LEN: usize = 511;

/// Instance label attached to every submission.
pub const SUBMIT_INSTANCE: &str = "-";

/// The two fixed metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGroup {
    Commands,
    Traffic,
}

impl MetricGroup {
    /// Schema of this group; field order is taken from here.
    pub fn data_set(self) -> &'static DataSet {
        match self {
            Self::Commands => &MYSQL_COMMANDS,
            Self::Traffic => &MYSQL_TRAFFIC,
        }
    }

    /// Sink name, e.g. `mysql_commands`.
    pub fn name(self) -> &'static str {
        self.data_set().name
    }
}

/// Counters that can be submitted as one record.
pub trait CounterGroup {
    const GROUP: MetricGroup;

    /// Values in the group's declared field order.
    fn values(&self) -> Vec<u64>;
}

impl CounterGroup for CommandCounters {
    const GROUP: MetricGroup = MetricGroup::Commands;

    fn values(&self) -> Vec<u64> {
        vec![self.insert, self.select, self.show, self.update, self.other]
    }
}

impl CounterGroup for TrafficCounters {
    const GROUP: MetricGroup = MetricGroup::Traffic;

    fn values(&self) -> Vec<u64> {
        vec![self.incoming, self.outgoing]
    }
}

/// A timestamped set of values for one metric group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub values: Vec<u64>,
}

impl MetricRecord {
    pub fn new(timestamp: i64, values: Vec<u64>) -> Self {
        Self { timestamp, values }
    }

    /// Stamp `values` with the current wall-clock time.
    pub fn now(values: Vec<u64>) -> Self {
        Self::new(Utc::now().timestamp(), values)
    }

    /// Render as `<timestamp>:<v1>:<v2>:...`.
    ///
    /// # Errors
    /// `EncodingOverflow` if the text is longer than `limit` bytes.
    pub fn encode(&self, limit: usize) -> Result<String, CollectorError> {
        let out = std::iter::once(self.timestamp.to_string())
            .chain(self.values.iter().map(u64::to_string))
            .collect::<Vec<_>>()
            .join(":");

        if out.len() > limit {
            return Err(CollectorError::EncodingOverflow {
                len: out.len(),
                limit,
            });
        }
        Ok(out)
    }
}

/// Packages aggregated counters into records and hands them to the sink.
#[derive(Clone)]
pub struct Submitter {
    sink: Arc<dyn MetricSink>,
    max_record_len: usize,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("max_record_len", &self.max_record_len)
            .finish_non_exhaustive()
    }
}

impl Submitter {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            sink,
            max_record_len: MAX_RECORD_LEN,
        }
    }

    /// Override the encoded size limit.
    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    /// Submit one group's counters stamped with the current time.
    pub fn submit<A: CounterGroup>(&self, counters: &A) -> Result<(), CollectorError> {
        self.submit_record(A::GROUP, &MetricRecord::now(counters.values()))
    }

    /// Encode `record` and pass it to the sink under `group`'s name.
    ///
    /// Nothing is retried; a dropped record is only logged.
    pub fn submit_record(
        &self,
        group: MetricGroup,
        record: &MetricRecord,
    ) -> Result<(), CollectorError> {
        debug_assert_eq!(record.values.len(), group.data_set().len());

        let encoded = record.encode(self.max_record_len).inspect_err(|e| {
            tracing::warn!(group = group.name(), error = %e, "Dropping oversized record");
        })?;

        self.sink
            .submit(group.name(), SUBMIT_INSTANCE, &encoded)
            .map_err(|e| {
                tracing::error!(group = group.name(), error = %e, "Sink rejected record");
                CollectorError::from(e)
            })?;

        tracing::trace!(group = group.name(), record = %encoded, "Record submitted");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    fn submitter() -> (Arc<RecordingSink>, Submitter) {
        let sink = Arc::new(RecordingSink::default());
        let submitter = Submitter::new(sink.clone());
        (sink, submitter)
    }

    #[test]
    fn test_encode() {
        let record = MetricRecord::new(1_700_000_000, vec![5, 10, 0, 0, 0]);
        assert_eq!(record.encode(MAX_RECORD_LEN).unwrap(), "1700000000:5:10:0:0:0");

        let empty = MetricRecord::new(42, vec![]);
        assert_eq!(empty.encode(MAX_RECORD_LEN).unwrap(), "42");
    }

    #[test]
    fn test_encode_overflow() {
        let record = MetricRecord::new(1_700_000_000, vec![u64::MAX, u64::MAX]);
        let err = record.encode(16).unwrap_err();
        assert!(matches!(
            err,
            CollectorError::EncodingOverflow { len: 52, limit: 16 }
        ));
    }

    #[test]
    fn test_encode_at_limit() {
        let record = MetricRecord::new(1, vec![2, 3]);
        assert_eq!(record.encode(5).unwrap(), "1:2:3");
        assert!(record.encode(4).is_err());
    }

    #[test]
    fn test_group_names_and_order() {
        assert_eq!(MetricGroup::Commands.name(), "mysql_commands");
        assert_eq!(MetricGroup::Traffic.name(), "mysql_traffic");

        let fields: Vec<_> = MetricGroup::Commands.data_set().field_names().collect();
        assert_eq!(fields, ["insert", "select", "show", "update", "other"]);

        let counters = CommandCounters {
            insert: 1,
            select: 2,
            show: 3,
            update: 4,
            other: 5,
        };
        assert_eq!(counters.values(), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            TrafficCounters {
                incoming: 7,
                outgoing: 8
            }
            .values(),
            vec![7, 8]
        );
    }

    #[test]
    fn test_submit_uses_instance_and_name() {
        let (sink, submitter) = submitter();
        let before = Utc::now().timestamp();

        submitter
            .submit(&TrafficCounters {
                incoming: 100,
                outgoing: 50,
            })
            .unwrap();

        let taken = sink.taken();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].name, "mysql_traffic");
        assert_eq!(taken[0].instance, "-");

        let (ts, values) = taken[0].record.split_once(':').unwrap();
        assert!(ts.parse::<i64>().unwrap() >= before);
        assert_eq!(values, "100:50");
    }

    #[test]
    fn test_all_zero_is_still_submitted() {
        let (sink, submitter) = submitter();
        submitter.submit(&CommandCounters::default()).unwrap();
        assert_eq!(sink.values(), vec!["0:0:0:0:0"]);
    }

    #[test]
    fn test_oversized_record_is_dropped() {
        let (sink, submitter) = submitter();
        let submitter = submitter.with_max_record_len(8);

        let err = submitter
            .submit(&CommandCounters::default())
            .unwrap_err();
        assert!(matches!(err, CollectorError::EncodingOverflow { .. }));
        assert!(sink.taken().is_empty());
    }

    #[test]
    fn test_sink_error_is_reported() {
        let (sink, submitter) = submitter();
        sink.reject("mysql_commands");

        let err = submitter
            .submit(&CommandCounters::default())
            .unwrap_err();
        assert!(matches!(err, CollectorError::Storage(_)));
    }
}
