//! SQLite warehouse for local snapshots and tests

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Params};

use super::{dimension_upsert_sql, id_lookup_sql, interaction_upsert_sql, Dialect, Warehouse};
use super::schema::SQLITE_SCHEMA;
use crate::catalog::OlapTable;
use crate::error::{ConstraintKind, EtlError, Result};
use crate::model::{ContentDim, PlaceDim, PropertyDim, ResolvedInteraction, UserDim};

pub struct SqliteWarehouse {
    conn: Connection,
    label: String,
}

/// Timestamps are stored as RFC 3339 with a fixed precision so text
/// comparison orders them correctly.
fn ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn constraint_kind(extended_code: i32) -> Option<ConstraintKind> {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_NOTNULL => Some(ConstraintKind::NotNull),
        ffi::SQLITE_CONSTRAINT_CHECK => Some(ConstraintKind::Check),
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            Some(ConstraintKind::Unique)
        }
        _ => None,
    }
}

/// Failures of the database file itself rather than of one statement
fn is_file_fault(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::SystemIoFailure
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DiskFull
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::ReadOnly
    )
}

impl SqliteWarehouse {
    /// Open or create the warehouse file
    pub fn open(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| EtlError::connection(&label, e))?;
        Self::with_connection(conn, label)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EtlError::connection(":memory:", e))?;
        Self::with_connection(conn, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, label: String) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| EtlError::connection(&label, e))?;
        Ok(Self { conn, label })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn classify(&self, table: OlapTable, err: rusqlite::Error) -> EtlError {
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            if let Some(kind) = constraint_kind(code.extended_code) {
                return EtlError::Constraint {
                    table: table.as_str().to_string(),
                    kind,
                    detail: message.clone().unwrap_or_else(|| err.to_string()),
                };
            }
            if is_file_fault(code.code) {
                return EtlError::connection(&self.label, err);
            }
        }
        EtlError::query(format!("{}.{}", self.label, table), err)
    }

    /// Run a dimension upsert; fall back to a lookup when the guard kept
    /// the stored row.
    fn upsert_dimension<P: Params, K: Params>(
        &self,
        table: OlapTable,
        values: P,
        key: K,
    ) -> Result<i64> {
        let sql = dimension_upsert_sql(Dialect::Sqlite, table);
        let returned = self
            .conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.query_row(values, |row| row.get::<_, i64>(0)).optional())
            .map_err(|e| self.classify(table, e))?;
        if let Some(id) = returned {
            return Ok(id);
        }

        let sql = id_lookup_sql(Dialect::Sqlite, table);
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| stmt.query_row(key, |row| row.get::<_, i64>(0)))
            .map_err(|e| self.classify(table, e))
    }
}

impl Warehouse for SqliteWarehouse {
    fn id(&self) -> &str {
        "sqlite"
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(SQLITE_SCHEMA)
            .map_err(|e| EtlError::query(&self.label, e))
    }

    fn upsert_user(&mut self, row: &UserDim) -> Result<i64> {
        self.upsert_dimension(
            OlapTable::Users,
            params![
                row.source_user_id,
                row.email,
                row.display_name,
                row.avatar_url,
                row.found_us_source.map(|s| s.as_str()),
                ts(row.created_at),
                ts(row.updated_at),
            ],
            params![row.email],
        )
    }

    fn upsert_content(&mut self, row: &ContentDim) -> Result<i64> {
        self.upsert_dimension(
            OlapTable::Content,
            params![
                row.source_content_id,
                row.key.platform.as_str(),
                row.key.platform_id,
                row.url,
                row.thumbnail_url,
                row.description,
                row.like_count,
                row.comment_count,
                ts(row.uploaded_at),
                ts(row.created_at),
                ts(row.updated_at),
            ],
            params![row.key.platform.as_str(), row.key.platform_id],
        )
    }

    fn upsert_place(&mut self, row: &PlaceDim) -> Result<i64> {
        self.upsert_dimension(
            OlapTable::Places,
            params![
                row.source_place_id,
                row.google_maps_id,
                row.english_display_name,
                row.zhtw_display_name,
                row.english_address,
                row.zhtw_address,
                row.phone_number,
                row.rating,
                row.latitude,
                row.longitude,
                row.country_code,
                row.english_administrative_area,
                row.zhtw_administrative_area,
                row.english_locality,
                row.zhtw_locality,
                row.primary_type,
                ts(row.created_at),
                ts(row.updated_at),
            ],
            params![row.google_maps_id],
        )
    }

    fn upsert_property(&mut self, row: &PropertyDim) -> Result<i64> {
        self.upsert_dimension(
            OlapTable::Property,
            params![
                row.source_property_id,
                row.english_name,
                row.zhtw_name,
                row.emoji,
                row.category_type.as_str(),
                ts(row.created_at),
                ts(row.updated_at),
            ],
            params![row.source_property_id],
        )
    }

    fn upsert_interaction(&mut self, row: &ResolvedInteraction) -> Result<()> {
        let table = OlapTable::Interactions;
        let sql = interaction_upsert_sql(Dialect::Sqlite);
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    row.user_id,
                    row.content_id,
                    row.place_id,
                    row.property_id,
                    row.interaction_count,
                    ts(Some(row.first_interaction_at)),
                    ts(Some(row.last_interaction_at)),
                ])
            })
            .map_err(|e| self.classify(table, e))?;
        Ok(())
    }

    fn count_rows(&mut self, table: OlapTable) -> Result<i64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(|e| self.classify(table, e))
    }
}
