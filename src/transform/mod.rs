//! Transform stage: raw OLTP tables to star-schema rows
//!
//! Pure and in-memory. Each dimension goes through the same steps: required
//! column check, per-row mapping and validation, then deduplication by
//! natural key. Facts are aggregated last, against the id maps the
//! dimensions produce.

mod content;
#[cfg(test)]
pub(crate) mod fixtures;
mod interactions;
mod places;
mod property;
mod users;
pub mod validate;

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::catalog::{OlapTable, TABLES_TO_EXTRACT};
use crate::error::{EtlError, Result};
use crate::model::{ContentDim, InteractionFact, PlaceDim, PropertyDim, UserDim};
use crate::report::{RejectCategory, Stage, StageReport};
use crate::source::RawExtract;
use crate::table::{RowView, Table};

pub use interactions::SourceIdMaps;

/// OLAP-ready rows
#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub users: Vec<UserDim>,
    pub content: Vec<ContentDim>,
    pub places: Vec<PlaceDim>,
    pub properties: Vec<PropertyDim>,
    pub interactions: Vec<InteractionFact>,
}

/// Counts and rejections of the transform stage
pub type TransformReport = StageReport;

/// A source row that failed mapping or validation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Malformed {
    pub key: String,
    pub reason: String,
}

impl Malformed {
    /// Keyed by the row's source id when it has one, else by position.
    pub fn new(row: &RowView<'_>, reason: impl Into<String>) -> Self {
        Self {
            key: row
                .text("id")
                .unwrap_or_else(|| format!("row {}", row.index + 1)),
            reason: reason.into(),
        }
    }
}

/// A dimension row type built from one source table
pub(crate) trait DimensionRow: Sized {
    type Key: Clone + Eq + Hash;

    const TABLE: OlapTable;

    /// Source columns that must exist in the extract
    const REQUIRED: &'static [&'static str];

    fn from_row(row: &RowView<'_>) -> Result<Self, Malformed>;

    fn natural_key(&self) -> Self::Key;

    fn source_id(&self) -> &str;

    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

/// Deduplicated dimension rows plus the source id map
pub(crate) struct DimOutput<D: DimensionRow> {
    pub rows: Vec<D>,
    /// Every valid source id, merged duplicates included, to its natural key
    pub ids: HashMap<String, D::Key>,
}

/// Keep one row per key: the greatest `updated_at`, later rows winning ties.
///
/// Survivors stay in first-seen order. Returns the number of rows folded away.
pub(crate) fn dedup_latest<T, K, FK, FU>(rows: Vec<T>, key: FK, updated: FU) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FU: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<T> = Vec::with_capacity(rows.len());
    let mut merged = 0;

    for row in rows {
        match index.get(&key(&row)) {
            Some(&i) => {
                merged += 1;
                if updated(&row) >= updated(&out[i]) {
                    out[i] = row;
                }
            }
            None => {
                index.insert(key(&row), out.len());
                out.push(row);
            }
        }
    }

    (out, merged)
}

pub(crate) fn build_dimension<D: DimensionRow>(
    raw: &Table,
    report: &mut TransformReport,
) -> Result<DimOutput<D>> {
    raw.require_columns(D::REQUIRED)?;
    report.counts_mut(D::TABLE).extracted += raw.len();

    let mut valid = Vec::with_capacity(raw.len());
    for row in raw.iter() {
        match D::from_row(&row) {
            Ok(dim) => valid.push(dim),
            Err(bad) => report.reject(D::TABLE, bad.key, RejectCategory::Malformed, bad.reason),
        }
    }

    let ids: HashMap<String, D::Key> = valid
        .iter()
        .map(|d| (d.source_id().to_string(), d.natural_key()))
        .collect();
    let (rows, merged) = dedup_latest(valid, D::natural_key, D::updated_at);

    let counts = report.counts_mut(D::TABLE);
    counts.merged += merged;
    counts.transformed += rows.len();
    tracing::info!(table = %D::TABLE, rows = rows.len(), merged, "transformed dimension");

    Ok(DimOutput { rows, ids })
}

fn table<'a>(raw: &'a RawExtract, name: &str) -> Result<&'a Table> {
    raw.get(name)
        .ok_or_else(|| EtlError::MissingTables(vec![name.to_string()]))
}

/// Run the whole transform stage.
pub fn transform(raw: &RawExtract) -> Result<(Transformed, TransformReport)> {
    let missing: Vec<String> = TABLES_TO_EXTRACT
        .iter()
        .filter(|t| raw.get(t.name).is_none())
        .map(|t| t.name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::MissingTables(missing));
    }

    let mut report = TransformReport::new(Stage::Transform);

    let users = build_dimension::<UserDim>(table(raw, "users")?, &mut report)?;
    let content = build_dimension::<ContentDim>(table(raw, "contents")?, &mut report)?;
    let places = build_dimension::<PlaceDim>(table(raw, "places")?, &mut report)?;
    let properties = build_dimension::<PropertyDim>(table(raw, "property_mapping")?, &mut report)?;

    let maps = SourceIdMaps {
        users: &users.ids,
        content: &content.ids,
        places: &places.ids,
        properties: &properties.ids,
    };
    let interactions = interactions::aggregate(
        table(raw, "user_contents")?,
        table(raw, "content_places")?,
        table(raw, "place_properties")?,
        &maps,
        &mut report,
    )?;

    Ok((
        Transformed {
            users: users.rows,
            content: content.rows,
            places: places.rows,
            properties: properties.rows,
            interactions,
        },
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).single()
    }

    #[test]
    fn dedup_keeps_latest_and_later_on_ties() {
        let rows = vec![
            ("a", 1, ts(2)),
            ("b", 2, ts(1)),
            ("a", 3, ts(1)),
            ("b", 4, ts(1)),
            ("a", 5, ts(2)),
        ];
        let (out, merged) = dedup_latest(rows, |r| r.0, |r| r.2);
        assert_eq!(merged, 3);
        assert_eq!(out.iter().map(|r| r.1).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn missing_tables_are_listed() {
        let mut raw = RawExtract::new();
        for spec in TABLES_TO_EXTRACT.iter().skip(2) {
            raw.insert(Table::new(spec.name, &spec.column_names()));
        }
        match transform(&raw).unwrap_err() {
            EtlError::MissingTables(names) => assert_eq!(names, vec!["users", "contents"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_extract_transforms_to_nothing() {
        let mut raw = RawExtract::new();
        for spec in TABLES_TO_EXTRACT.iter() {
            raw.insert(Table::new(spec.name, &spec.column_names()));
        }
        let (out, report) = transform(&raw).unwrap();
        assert!(out.users.is_empty());
        assert!(out.interactions.is_empty());
        assert!(report.rejections.is_empty());
    }
}
