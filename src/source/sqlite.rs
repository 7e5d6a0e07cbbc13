//! SQLite source connector, used for local snapshots and tests

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use super::SourceConnector;
use crate::catalog::SourceTable;
use crate::error::{EtlError, Result};
use crate::table::{parse_timestamp, ColumnKind, Table, Value};

pub struct SqliteSource {
    conn: Connection,
    label: String,
}

impl SqliteSource {
    /// Open an existing database file read-only
    pub fn open(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EtlError::connection(&label, e))?;
        Ok(Self { conn, label })
    }

    pub fn from_connection(conn: Connection, label: impl Into<String>) -> Self {
        Self {
            conn,
            label: label.into(),
        }
    }

    fn target(&self, table: &str) -> String {
        format!("{}.{}", self.label, table)
    }

    fn existing_columns(&self, spec: &SourceTable) -> Result<Vec<&'static str>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;
        let present = stmt
            .query_map([spec.name], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;

        if present.is_empty() {
            return Err(EtlError::query(self.target(spec.name), "table does not exist"));
        }

        Ok(spec
            .column_names()
            .into_iter()
            .filter(|c| present.iter().any(|p| p == c))
            .collect())
    }
}

/// Decode a SQLite value according to the declared column kind.
///
/// SQLite is loosely typed, so booleans arrive as integers and timestamps
/// as text. Text that does not parse is kept as text and rejected later.
fn decode(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => match kind {
            ColumnKind::Boolean => Value::Bool(n != 0),
            ColumnKind::Float => Value::Float(n as f64),
            ColumnKind::Text => Value::Text(n.to_string()),
            _ => Value::Int(n),
        },
        ValueRef::Real(f) => match kind {
            ColumnKind::Text => Value::Text(f.to_string()),
            _ => Value::Float(f),
        },
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match kind {
                ColumnKind::Timestamp => parse_timestamp(&text)
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Text(text)),
                _ => Value::Text(text),
            }
        }
    }
}

impl SourceConnector for SqliteSource {
    fn id(&self) -> &str {
        "sqlite"
    }

    fn description(&self) -> String {
        format!("sqlite://{}", self.label)
    }

    fn fetch_table(&mut self, spec: &SourceTable) -> Result<Table> {
        let columns = self.existing_columns(spec)?;
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let sql = format!("SELECT {} FROM \"{}\"", quoted.join(", "), spec.name);
        tracing::debug!(table = spec.name, %sql, "reading source table");

        let kinds: Vec<ColumnKind> = columns
            .iter()
            .map(|c| spec.kind_of(c).unwrap_or(ColumnKind::Text))
            .collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;
        let rows = stmt
            .query_map([], |row| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(idx, kind)| row.get_ref(idx).map(|v| decode(v, *kind)))
                    .collect::<Result<Vec<_>, _>>()
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;

        let mut table = Table::new(spec.name, &columns);
        for values in rows {
            table.push(values);
        }
        Ok(table)
    }
}
