//! Lazy CSV export
//!
//! The query runs on a worker thread that owns its own connection and feeds
//! lines through a bounded channel, so rows are pulled from DuckDB only as
//! fast as the consumer reads them.

use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;

use duckdb::{params_from_iter, Connection};
use tracing::{debug, warn};

use crate::value::{to_json, to_text};
use crate::BackendError;

/// Escape one CSV field.
pub fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Join already-stringified fields into a newline-terminated record.
pub fn csv_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = fields
        .into_iter()
        .map(|f| escape_csv(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Header line followed by one line per row. Finite; to restart, export again.
pub struct CsvStream {
    rx: Receiver<Result<String, BackendError>>,
}

impl CsvStream {
    pub(crate) fn spawn(conn: Connection, sql: String, params: Vec<String>, depth: usize) -> Self {
        let (tx, rx) = sync_channel(depth.max(1));

        thread::spawn(move || {
            let result = (|| -> Result<(), BackendError> {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

                if tx.send(Ok(csv_line(&columns))).is_err() {
                    return Ok(());
                }

                let mut sent = 0usize;
                while let Some(row) = rows.next()? {
                    let mut fields = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        fields.push(to_text(&to_json(row.get_ref(i)?)));
                    }
                    if tx.send(Ok(csv_line(&fields))).is_err() {
                        debug!(sent, "CSV consumer went away");
                        return Ok(());
                    }
                    sent += 1;
                }
                debug!(sent, "CSV export finished");
                Ok(())
            })();

            if let Err(e) = result {
                warn!(error = %e, "CSV export failed");
                let _ = tx.send(Err(e));
            }
        });

        Self { rx }
    }
}

impl Iterator for CsvStream {
    type Item = Result<String, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_line() {
        assert_eq!(csv_line(["state", "party", "votes"]), "state,party,votes\n");
        assert_eq!(csv_line(["", "x,y"]), ",\"x,y\"\n");
    }
}
