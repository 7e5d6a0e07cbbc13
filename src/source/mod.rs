//! Source connectors for the OLTP database
//!
//! A connector owns one connection for the duration of the extract stage
//! and is dropped as soon as every table has been read.

mod postgres;
mod sqlite;

pub use self::postgres::PostgresSource;
pub use self::sqlite::SqliteSource;

use std::collections::BTreeMap;

use crate::catalog::{SourceTable, TABLES_TO_EXTRACT};
use crate::config::Endpoint;
use crate::error::Result;
use crate::table::Table;

/// A database the extract stage can read from
pub trait SourceConnector {
    /// Short identifier used in logs and error messages
    fn id(&self) -> &str;

    /// Human-readable description (never includes credentials)
    fn description(&self) -> String;

    /// Read every row of `spec`, selecting the catalog columns that exist.
    fn fetch_table(&mut self, spec: &SourceTable) -> Result<Table>;
}

/// Open a connector for the given endpoint. One attempt, no retry.
pub fn open_source(endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
    match endpoint {
        Endpoint::Postgres(params) => Ok(Box::new(PostgresSource::connect(params)?)),
        Endpoint::Sqlite(path) => Ok(Box::new(SqliteSource::open(path)?)),
    }
}

/// Raw extract: one table per source table name
#[derive(Debug, Clone, Default)]
pub struct RawExtract {
    tables: BTreeMap<String, Table>,
}

impl RawExtract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.get(name).map_or(0, Table::len)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// Read every table in the extract list into `extract`.
///
/// Tables read before a failure stay in `extract`.
pub fn extract_all(connector: &mut dyn SourceConnector, extract: &mut RawExtract) -> Result<()> {
    for spec in TABLES_TO_EXTRACT.iter() {
        let table = connector.fetch_table(spec)?;
        if table.is_empty() {
            tracing::warn!(table = spec.name, "source table is empty");
        } else {
            tracing::info!(table = spec.name, rows = table.len(), "extracted");
        }
        extract.insert(table);
    }

    Ok(())
}
