//! DuckDB backend for table views
//!
//! Two kinds of engine run view queries:
//! - a durable, read-only database file holding the large datasets
//! - small in-memory databases, one per logical table built from literal rows
//!
//! An [`Engine`] keeps one base connection and hands out cheap clones of it,
//! so every request works on its own connection to the same database.

use std::fmt;
use std::path::Path;

use duckdb::{params_from_iter, AccessMode, Config, Connection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tablehub_ir::{quote_ident, Column};
use thiserror::Error;
use tracing::{debug, info};

mod csv;
pub mod value;

pub use csv::{csv_line, escape_csv, CsvStream};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Cannot resolve schema of `{sql}`: {source}")]
    Schema {
        sql: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("The {0} backend is read-only")]
    ReadOnly(BackendKind),
}

/// Which engine a view's queries run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Disk,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Disk => f.write_str("disk"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Rows and column names returned by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// A table in the durable database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub column_count: usize,
    pub row_count: usize,
}

pub struct Engine {
    kind: BackendKind,
    label: String,
    base: Mutex<Connection>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish()
    }
}

const NULL_ORDER: &str = "PRAGMA default_null_order='NULLS LAST'";

impl Engine {
    /// Open the durable database file read-only.
    pub fn open_disk<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path.as_ref(), config)?;
        conn.execute_batch(NULL_ORDER)?;

        let label = path.as_ref().display().to_string();
        info!(path = %label, "Opened durable database");
        Ok(Self {
            kind: BackendKind::Disk,
            label,
            base: Mutex::new(conn),
        })
    }

    /// Create a fresh, isolated in-memory database.
    pub fn open_memory(label: impl Into<String>) -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(NULL_ORDER)?;

        Ok(Self {
            kind: BackendKind::Memory,
            label: label.into(),
            base: Mutex::new(conn),
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// A new connection to this engine's database.
    pub fn connection(&self) -> Result<Connection, BackendError> {
        let conn = self.base.lock().try_clone()?;
        conn.execute_batch(NULL_ORDER)?;
        Ok(conn)
    }

    /// Create `table` with VARCHAR columns and insert `rows`.
    ///
    /// Only valid on memory engines, and only once per table.
    pub fn load_records(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<(), BackendError> {
        if self.kind != BackendKind::Memory {
            return Err(BackendError::ReadOnly(self.kind));
        }

        let conn = self.base.lock();
        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} VARCHAR", quote_ident(c)))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_ident(table),
            column_defs.join(", ")
        ))?;

        let placeholders = vec!["?"; columns.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} VALUES ({});",
            quote_ident(table),
            placeholders
        ))?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }

        debug!(table, rows = rows.len(), "Loaded literal rows");
        Ok(())
    }

    /// Output columns of `sql` without fetching any rows.
    pub fn describe(&self, sql: &str, params: &[String]) -> Result<Vec<Column>, BackendError> {
        let describe = format!("DESCRIBE {sql}");
        debug!(sql = %describe, ?params, "Probing schema");

        let schema_err = |source: duckdb::Error| BackendError::Schema {
            sql: sql.to_string(),
            source,
        };

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&describe).map_err(schema_err)?;
        let columns = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(Column::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(schema_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(schema_err)?;

        Ok(columns)
    }

    /// Run `sql` with positional `params` and collect every row.
    pub fn query(&self, sql: &str, params: &[String]) -> Result<QueryResult, BackendError> {
        debug!(%sql, ?params, "Executing query");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

        let mut result_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(value::to_json(row.get_ref(i)?));
            }
            result_rows.push(cells);
        }

        Ok(QueryResult {
            columns,
            rows: result_rows,
        })
    }

    /// Stream `sql` as CSV lines, header first.
    pub fn stream_csv(
        &self,
        sql: &str,
        params: &[String],
        depth: usize,
    ) -> Result<CsvStream, BackendError> {
        debug!(%sql, ?params, "Streaming CSV");
        Ok(CsvStream::spawn(
            self.connection()?,
            sql.to_string(),
            params.to_vec(),
            depth,
        ))
    }

    /// Tables of the `main` schema, with their width and row counts.
    pub fn tables(&self) -> Result<Vec<TableInfo>, BackendError> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let column_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_schema = 'main' AND table_name = ?",
                duckdb::params![name],
                |row| row.get(0),
            )?;
            let row_count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
                [],
                |row| row.get(0),
            )?;
            tables.push(TableInfo {
                name,
                column_count: column_count as usize,
                row_count: row_count as usize,
            });
        }

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablehub_ir::ColumnType;

    fn people() -> Engine {
        let engine = Engine::open_memory("people").unwrap();
        engine
            .load_records(
                "people",
                &["name".to_string(), "city".to_string()],
                &[
                    vec![Some("Ann".to_string()), Some("Oslo".to_string())],
                    vec![Some("Bob".to_string()), None],
                ],
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_memory_engine_round_trip() -> Result<(), BackendError> {
        let engine = people();

        let result = engine.query(r#"SELECT * FROM "people" ORDER BY "name""#, &[])?;
        assert_eq!(result.columns, vec!["name", "city"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1][1], serde_json::Value::Null);
        Ok(())
    }

    #[test]
    fn test_describe_with_params() -> Result<(), BackendError> {
        let engine = people();

        let columns = engine.describe(
            r#"SELECT "name" FROM "people" WHERE regexp_matches("name", ?)"#,
            &["^A".to_string()],
        )?;
        assert_eq!(columns, vec![Column::new("name", ColumnType::Varchar)]);
        Ok(())
    }

    #[test]
    fn test_describe_unknown_column_is_schema_error() {
        let engine = people();

        let err = engine
            .describe(r#"SELECT "nope" FROM "people""#, &[])
            .unwrap_err();
        assert!(matches!(err, BackendError::Schema { .. }));
    }

    #[test]
    fn test_memory_engines_are_isolated() {
        let _first = people();
        let second = Engine::open_memory("other").unwrap();

        assert!(second.query(r#"SELECT * FROM "people""#, &[]).is_err());
    }

    #[test]
    fn test_nulls_sort_last() -> Result<(), BackendError> {
        let engine = people();

        let result = engine.query(r#"SELECT "city" FROM "people" ORDER BY "city""#, &[])?;
        assert_eq!(result.rows[0][0], serde_json::json!("Oslo"));
        assert_eq!(result.rows[1][0], serde_json::Value::Null);
        Ok(())
    }

    #[test]
    fn test_stream_csv() -> Result<(), BackendError> {
        let engine = people();

        let lines = engine
            .stream_csv(r#"SELECT * FROM "people" ORDER BY "name""#, &[], 4)?
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines, vec!["name,city\n", "Ann,Oslo\n", "Bob,\n"]);
        Ok(())
    }
}
