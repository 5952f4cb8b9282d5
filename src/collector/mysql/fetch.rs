//! Status query and lenient row parsing.

use crate::collector::CollectorError;
use crate::collector::mysql::connection::StatusConnection;

/// The single introspection query issued per cycle.
pub const STATUS_QUERY: &str = "SHOW GLOBAL STATUS";

/// A status row as returned by the server, before numeric parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatusRow {
    pub key: String,
    /// `None` when the server reported NULL.
    pub value: Option<String>,
}

/// One status counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub key: String,
    pub value: u64,
}

impl StatusRow {
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl From<RawStatusRow> for StatusRow {
    fn from(raw: RawStatusRow) -> Self {
        Self {
            value: raw.value.as_deref().map_or(0, parse_counter),
            key: raw.key,
        }
    }
}

/// Parse a status value without ever failing.
///
/// Leading whitespace and a `+` sign are skipped, then the longest run of
/// ASCII digits is read. Anything without leading digits (including
/// negative numbers) is 0; values past `u64::MAX` saturate.
pub fn parse_counter(text: &str) -> u64 {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    text.bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, d| {
            acc.saturating_mul(10).saturating_add(u64::from(d - b'0'))
        })
}

/// Run [`STATUS_QUERY`] and return its rows in server order.
///
/// The result set is fully materialized and released before this returns.
///
/// # Errors
/// `Query` if the statement fails, `ResultMaterialization` if a row
/// cannot be read. Either aborts the cycle.
pub async fn fetch<S: StatusConnection>(conn: &mut S) -> Result<Vec<StatusRow>, CollectorError> {
    let raw = conn.query_status(STATUS_QUERY).await?;
    tracing::trace!(rows = raw.len(), "Status rows fetched");
    Ok(raw.into_iter().map(StatusRow::from).collect())
}
