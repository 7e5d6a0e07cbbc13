//! OLAP warehouse storage
//!
//! One trait, two backends. SQL text is built here once per dialect so both
//! backends share the same conflict targets and last-write-wins guard.

mod postgres;
mod schema;
mod sqlite;

pub use self::postgres::PostgresWarehouse;
pub use self::sqlite::SqliteWarehouse;
pub use schema::{POSTGRES_SCHEMA, SQLITE_SCHEMA};

use crate::catalog::OlapTable;
use crate::config::Endpoint;
use crate::error::Result;
use crate::model::{ContentDim, PlaceDim, PropertyDim, ResolvedInteraction, UserDim};

/// Write side of the star schema
///
/// Dimension upserts return the row's surrogate id whether the row was
/// inserted, updated, or left alone because the stored version is newer.
pub trait Warehouse {
    fn id(&self) -> &str;

    fn ensure_schema(&mut self) -> Result<()>;

    fn upsert_user(&mut self, row: &UserDim) -> Result<i64>;

    fn upsert_content(&mut self, row: &ContentDim) -> Result<i64>;

    fn upsert_place(&mut self, row: &PlaceDim) -> Result<i64>;

    fn upsert_property(&mut self, row: &PropertyDim) -> Result<i64>;

    /// Insert a fact or fold it into the existing one
    fn upsert_interaction(&mut self, row: &ResolvedInteraction) -> Result<()>;

    fn count_rows(&mut self, table: OlapTable) -> Result<i64>;
}

/// Connect to the warehouse. One attempt, no retry.
pub fn open_warehouse(endpoint: &Endpoint) -> Result<Box<dyn Warehouse>> {
    match endpoint {
        Endpoint::Postgres(params) => Ok(Box::new(PostgresWarehouse::connect(params)?)),
        Endpoint::Sqlite(path) => Ok(Box::new(SqliteWarehouse::open(path)?)),
    }
}

/// Natural key columns, the conflict target of each dimension upsert
pub fn natural_key_columns(table: OlapTable) -> &'static [&'static str] {
    match table {
        OlapTable::Users => &["email"],
        OlapTable::Content => &["platform", "platform_id"],
        OlapTable::Places => &["google_maps_id"],
        OlapTable::Property => &["source_property_id"],
        OlapTable::Interactions => &["user_id", "content_id", "place_id", "property_id"],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    fn least(&self) -> &'static str {
        match self {
            Dialect::Postgres => "LEAST",
            Dialect::Sqlite => "MIN",
        }
    }

    fn greatest(&self) -> &'static str {
        match self {
            Dialect::Postgres => "GREATEST",
            Dialect::Sqlite => "MAX",
        }
    }
}

/// `INSERT .. ON CONFLICT (natural key) DO UPDATE .. WHERE newer RETURNING id`
///
/// Parameters follow `table.columns()` order.
pub(crate) fn dimension_upsert_sql(dialect: Dialect, table: OlapTable) -> String {
    let columns = table.columns();
    let keys = natural_key_columns(table);
    let placeholders: Vec<String> = (1..=columns.len()).map(|n| dialect.placeholder(n)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !keys.contains(c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO {table} ({}) VALUES ({}) \
         ON CONFLICT ({}) DO UPDATE SET {} \
         WHERE {table}.updated_at IS NULL OR {table}.updated_at <= excluded.updated_at \
         RETURNING id",
        columns.join(", "),
        placeholders.join(", "),
        keys.join(", "),
        updates.join(", "),
    )
}

/// Surrogate id by natural key; parameters follow `natural_key_columns` order.
pub(crate) fn id_lookup_sql(dialect: Dialect, table: OlapTable) -> String {
    let conditions: Vec<String> = natural_key_columns(table)
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c} = {}", dialect.placeholder(i + 1)))
        .collect();
    format!("SELECT id FROM {table} WHERE {}", conditions.join(" AND "))
}

pub(crate) fn interaction_upsert_sql(dialect: Dialect) -> String {
    let table = OlapTable::Interactions;
    let columns = table.columns();
    let placeholders: Vec<String> = (1..=columns.len()).map(|n| dialect.placeholder(n)).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({}) \
         ON CONFLICT ({}) DO UPDATE SET \
         interaction_count = {table}.interaction_count + excluded.interaction_count, \
         first_interaction_at = {}({table}.first_interaction_at, excluded.first_interaction_at), \
         last_interaction_at = {}({table}.last_interaction_at, excluded.last_interaction_at)",
        columns.join(", "),
        placeholders.join(", "),
        natural_key_columns(table).join(", "),
        dialect.least(),
        dialect.greatest(),
    )
}
