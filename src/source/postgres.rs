//! PostgreSQL source connector

use postgres::{Client, NoTls, Row};

use super::SourceConnector;
use crate::catalog::SourceTable;
use crate::config::PgParams;
use crate::error::{EtlError, Result};
use crate::table::{ColumnKind, Table, Value};

pub struct PostgresSource {
    client: Client,
    label: String,
}

impl PostgresSource {
    pub fn connect(params: &PgParams) -> Result<Self> {
        let label = format!("{}:{}/{}", params.host, params.port, params.database);
        let client = params
            .to_pg_config()
            .connect(NoTls)
            .map_err(|e| EtlError::connection(&label, e))?;
        tracing::debug!(source = %label, "connected to postgres source");
        Ok(Self { client, label })
    }

    fn target(&self, table: &str) -> String {
        format!("{}.{}", self.label, table)
    }

    /// Column names present in the source table, in catalog order
    fn existing_columns(&mut self, spec: &SourceTable) -> Result<Vec<&'static str>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&spec.name],
            )
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;

        if rows.is_empty() {
            return Err(EtlError::query(self.target(spec.name), "table does not exist"));
        }

        let present: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        Ok(spec
            .column_names()
            .into_iter()
            .filter(|c| present.iter().any(|p| p == c))
            .collect())
    }
}

fn cast(column: &str, kind: ColumnKind) -> String {
    let ty = match kind {
        ColumnKind::Text => "text",
        ColumnKind::Integer => "int8",
        ColumnKind::Float => "float8",
        ColumnKind::Boolean => "boolean",
        ColumnKind::Timestamp => "timestamptz",
    };
    format!("\"{column}\"::{ty}")
}

/// Build the read query with a per-kind cast on every column
pub(crate) fn select_sql(spec: &SourceTable, columns: &[&str]) -> String {
    let list: Vec<String> = columns
        .iter()
        .map(|c| cast(c, spec.kind_of(c).unwrap_or(ColumnKind::Text)))
        .collect();
    format!("SELECT {} FROM \"{}\"", list.join(", "), spec.name)
}

fn decode(row: &Row, idx: usize, kind: ColumnKind) -> Result<Value, postgres::Error> {
    Ok(match kind {
        ColumnKind::Text => row.try_get::<_, Option<String>>(idx)?.into(),
        ColumnKind::Integer => row.try_get::<_, Option<i64>>(idx)?.into(),
        ColumnKind::Float => row.try_get::<_, Option<f64>>(idx)?.into(),
        ColumnKind::Boolean => row.try_get::<_, Option<bool>>(idx)?.into(),
        ColumnKind::Timestamp => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .into(),
    })
}

impl SourceConnector for PostgresSource {
    fn id(&self) -> &str {
        "postgres"
    }

    fn description(&self) -> String {
        format!("postgresql://{}", self.label)
    }

    fn fetch_table(&mut self, spec: &SourceTable) -> Result<Table> {
        let columns = self.existing_columns(spec)?;
        let sql = select_sql(spec, &columns);
        tracing::debug!(table = spec.name, %sql, "reading source table");

        let rows = self
            .client
            .query(sql.as_str(), &[])
            .map_err(|e| EtlError::query(self.target(spec.name), e))?;

        let kinds: Vec<ColumnKind> = columns
            .iter()
            .map(|c| spec.kind_of(c).unwrap_or(ColumnKind::Text))
            .collect();

        let mut table = Table::new(spec.name, &columns);
        for row in &rows {
            let values = kinds
                .iter()
                .enumerate()
                .map(|(idx, kind)| decode(row, idx, *kind))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| EtlError::query(self.target(spec.name), e))?;
            table.push(values);
        }
        Ok(table)
    }
}
