//! Data set declarations and table DDL.

use sqlx::SqlitePool;

use crate::storage::StorageError;
use crate::storage::types::{DataSet, DataSource};

/// Command counters: one field per aggregated statement family.
pub static MYSQL_COMMANDS: DataSet = DataSet {
    name: "mysql_commands",
    sources: &[
        DataSource::counter("insert"),
        DataSource::counter("select"),
        DataSource::counter("show"),
        DataSource::counter("update"),
        DataSource::counter("other"),
    ],
};

/// Network traffic counters in bytes.
pub static MYSQL_TRAFFIC: DataSet = DataSet {
    name: "mysql_traffic",
    sources: &[
        DataSource::counter("incoming"),
        DataSource::counter("outgoing"),
    ],
};

/// Every data set the storage layer accepts.
pub static DATA_SETS: &[&DataSet] = &[&MYSQL_COMMANDS, &MYSQL_TRAFFIC];

/// Look up a data set by its registered name.
pub fn data_set(name: &str) -> Option<&'static DataSet> {
    DATA_SETS.iter().copied().find(|ds| ds.name == name)
}

/// Catalog of declared data sources, one row per field.
pub const DATA_SOURCES_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS data_sources (
    data_set        TEXT NOT NULL,
    position        INTEGER NOT NULL,
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL,
    heartbeat_secs  INTEGER NOT NULL,
    min_value       INTEGER,
    max_value       INTEGER,
    PRIMARY KEY (data_set, name)
);
"#;

/// Quote an identifier; field names such as `insert` are SQL keywords.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// DDL for a data set's record table and its timestamp index.
pub fn data_set_table_ddl(ds: &DataSet) -> String {
    let columns = ds
        .field_names()
        .map(|f| format!("    {} INTEGER NOT NULL", quote_ident(f)))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    ts INTEGER NOT NULL,\n    instance TEXT NOT NULL,\n{columns}\n);\n\
         CREATE INDEX IF NOT EXISTS {index} ON {table} (ts);",
        table = quote_ident(ds.name),
        index = quote_ident(&format!("idx_{}_ts", ds.name)),
    )
}

/// Initialize the database schema.
///
/// Creates one table per data set and records every declared field in
/// `data_sources`. Safe to run against an existing database.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::raw_sql(DATA_SOURCES_TABLE_DDL).execute(pool).await?;

    for ds in DATA_SETS {
        sqlx::raw_sql(&data_set_table_ddl(ds)).execute(pool).await?;

        for (position, source) in ds.sources.iter().enumerate() {
            sqlx::query(
                "INSERT OR REPLACE INTO data_sources
                 (data_set, position, name, kind, heartbeat_secs, min_value, max_value)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(ds.name)
            .bind(position as i64)
            .bind(source.name)
            .bind(source.kind.as_ref())
            .bind(source.heartbeat.as_secs() as i64)
            .bind(source.min.map(|v| v as i64))
            .bind(source.max.map(|v| v as i64))
            .execute(pool)
            .await?;
        }
    }

    tracing::info!(data_sets = DATA_SETS.len(), "Database schema initialized");
    Ok(())
}
