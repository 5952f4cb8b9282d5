//! Core data types for the storage layer.
//!
//! - [`DataSet`] / [`DataSource`]: the fixed, named schemas records are written into
//! - [`RecordUpdate`]: a parsed `<timestamp>:<v1>:<v2>...` submission bound for a data set
//! - [`StoredRecord`]: a record read back from storage

use std::time::Duration;

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::storage::StorageError;

/// Heartbeat tolerance for every declared data source.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(25);

/// How a data source's values are interpreted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DataSourceKind {
    /// Monotonically increasing counter; consumers derive rates from deltas.
    Counter,
}

/// One named field of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSource {
    /// Field name (also the column name).
    pub name: &'static str,
    /// Value interpretation.
    pub kind: DataSourceKind,
    /// Maximum gap between updates before a value is considered unknown.
    pub heartbeat: Duration,
    /// Lower bound, if any.
    pub min: Option<u64>,
    /// Upper bound, if any.
    pub max: Option<u64>,
}

impl DataSource {
    /// A counter field with the default heartbeat, a minimum of 0 and no maximum.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: DataSourceKind::Counter,
            heartbeat: DEFAULT_HEARTBEAT,
            min: Some(0),
            max: None,
        }
    }

    /// Render as `DS:<name>:<KIND>:<heartbeat>:<min>:<max>`, with `U` for unbounded.
    pub fn definition(&self) -> String {
        let bound = |b: Option<u64>| b.map_or_else(|| "U".to_string(), |v| v.to_string());
        format!(
            "DS:{}:{}:{}:{}:{}",
            self.name,
            self.kind,
            self.heartbeat.as_secs(),
            bound(self.min),
            bound(self.max)
        )
    }
}

/// A fixed, named schema that submitted records are written into.
#[derive(Debug, PartialEq, Eq)]
pub struct DataSet {
    /// Registered sink name, also the table name.
    pub name: &'static str,
    /// Ordered fields.
    pub sources: &'static [DataSource],
}

impl DataSet {
    /// Number of fields.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the data set declares no fields.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sources.iter().map(|s| s.name)
    }
}

/// A parsed submission ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Target data set.
    pub data_set: &'static DataSet,
    /// Instance label supplied by the submitter.
    pub instance: String,
    /// Seconds since the Unix epoch.
    pub ts: i64,
    /// One value per data source, in declaration order.
    pub values: Vec<u64>,
}

impl RecordUpdate {
    /// Parse `<timestamp>:<v1>:...:<vN>` against `data_set`.
    ///
    /// # Errors
    /// Returns `StorageError::InvalidData` if a field is not a number or the
    /// value count differs from the data set's field count.
    pub fn parse(
        data_set: &'static DataSet,
        instance: impl Into<String>,
        text: &str,
    ) -> Result<Self, StorageError> {
        let mut parts = text.split(':');
        let ts = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::InvalidData("empty record".to_string()))?
            .parse::<i64>()
            .map_err(|e| StorageError::InvalidData(format!("bad timestamp in '{text}': {e}")))?;

        let values = parts
            .map(|p| {
                p.parse::<u64>()
                    .map_err(|e| StorageError::InvalidData(format!("bad value '{p}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() != data_set.len() {
            return Err(StorageError::InvalidData(format!(
                "{} expects {} values, got {}",
                data_set.name,
                data_set.len(),
                values.len()
            )));
        }

        Ok(Self {
            data_set,
            instance: instance.into(),
            ts,
            values,
        })
    }
}

/// A record read back from a data set table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Instance label.
    pub instance: String,
    /// Record timestamp (UTC).
    pub ts: DateTime<Utc>,
    /// Values in field order.
    pub values: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    static PAIR: DataSet = DataSet {
        name: "pair",
        sources: &[DataSource::counter("a"), DataSource::counter("b")],
    };

    #[test]
    fn test_data_source_definition() {
        assert_eq!(
            DataSource::counter("insert").definition(),
            "DS:insert:COUNTER:25:0:U"
        );
    }

    #[test]
    fn test_data_source_kind_from_str() {
        assert_eq!(
            DataSourceKind::from_str("counter").unwrap(),
            DataSourceKind::Counter
        );
        assert_eq!(DataSourceKind::Counter.as_ref(), "COUNTER");
        assert!(DataSourceKind::from_str("gauge").is_err());
    }

    #[test]
    fn test_record_update_parse() {
        let update = RecordUpdate::parse(&PAIR, "-", "1700000000:5:10").unwrap();
        assert_eq!(update.ts, 1_700_000_000);
        assert_eq!(update.instance, "-");
        assert_eq!(update.values, vec![5, 10]);
    }

    #[test]
    fn test_record_update_wrong_arity() {
        let err = RecordUpdate::parse(&PAIR, "-", "1700000000:5").unwrap_err();
        assert!(err.to_string().contains("expects 2 values, got 1"));
    }

    #[test]
    fn test_record_update_bad_fields() {
        assert!(RecordUpdate::parse(&PAIR, "-", "").is_err());
        assert!(RecordUpdate::parse(&PAIR, "-", "now:1:2").is_err());
        assert!(RecordUpdate::parse(&PAIR, "-", "1:x:2").is_err());
    }
}
