//! Run summary and rejected-row report

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::OlapTable;
use crate::error::{ConstraintKind, Result};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a row did not make it into the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCategory {
    /// Failed validation in the transform stage
    Malformed,
    /// References a dimension row that does not exist
    Orphan,
    NotNull,
    Check,
    ForeignKey,
    Unique,
    /// Any other statement the warehouse refused for this row
    DataError,
}

impl RejectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectCategory::Malformed => "malformed",
            RejectCategory::Orphan => "orphan",
            RejectCategory::NotNull => "not_null",
            RejectCategory::Check => "check",
            RejectCategory::ForeignKey => "foreign_key",
            RejectCategory::Unique => "unique",
            RejectCategory::DataError => "data_error",
        }
    }
}

impl From<ConstraintKind> for RejectCategory {
    fn from(kind: ConstraintKind) -> Self {
        match kind {
            ConstraintKind::NotNull => RejectCategory::NotNull,
            ConstraintKind::Check => RejectCategory::Check,
            ConstraintKind::ForeignKey => RejectCategory::ForeignKey,
            ConstraintKind::Unique => RejectCategory::Unique,
        }
    }
}

impl fmt::Display for RejectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub stage: Stage,
    pub table: OlapTable,
    pub key: String,
    pub category: RejectCategory,
    pub reason: String,
}

/// Per-table row counts across the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: usize,
    pub skipped: usize,
    /// Duplicates folded into a surviving row
    pub merged: usize,
    /// Soft-deleted source rows left out
    pub excluded: usize,
}

impl TableCounts {
    pub fn absorb(&mut self, other: &TableCounts) {
        self.extracted += other.extracted;
        self.transformed += other.transformed;
        self.loaded += other.loaded;
        self.skipped += other.skipped;
        self.merged += other.merged;
        self.excluded += other.excluded;
    }
}

/// Counts and rejections produced by one stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub counts: BTreeMap<OlapTable, TableCounts>,
    pub rejections: Vec<Rejection>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            counts: BTreeMap::new(),
            rejections: vec![],
        }
    }

    pub fn counts(&self, table: OlapTable) -> TableCounts {
        self.counts.get(&table).copied().unwrap_or_default()
    }

    pub fn counts_mut(&mut self, table: OlapTable) -> &mut TableCounts {
        self.counts.entry(table).or_default()
    }

    /// Drop a row: log it, count it as skipped, keep it for the rejects report.
    pub fn reject(
        &mut self,
        table: OlapTable,
        key: impl Into<String>,
        category: RejectCategory,
        reason: impl Into<String>,
    ) {
        let key = key.into();
        let reason = reason.into();
        tracing::warn!(stage = %self.stage, %table, %key, %category, %reason, "row rejected");
        self.counts_mut(table).skipped += 1;
        self.rejections.push(Rejection {
            stage: self.stage,
            table,
            key,
            category,
            reason,
        });
    }
}

/// Outcome of one pipeline run, complete or partial
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub tables: BTreeMap<OlapTable, TableCounts>,
    pub rejections: Vec<Rejection>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        let mut tables = BTreeMap::new();
        for table in OlapTable::LOAD_ORDER {
            tables.insert(table, TableCounts::default());
        }
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            failed_stage: None,
            error: None,
            tables,
            rejections: vec![],
        }
    }

    pub fn counts(&self, table: OlapTable) -> TableCounts {
        self.tables.get(&table).copied().unwrap_or_default()
    }

    /// Fold a stage's counts and rejections into the run totals
    pub fn absorb(&mut self, report: StageReport) {
        for (table, c) in &report.counts {
            self.tables.entry(*table).or_default().absorb(c);
        }
        self.rejections.extend(report.rejections);
    }

    pub fn is_success(&self) -> bool {
        self.failed_stage.is_none()
    }

    pub fn total_skipped(&self) -> usize {
        self.tables.values().map(|c| c.skipped).sum()
    }
}

#[derive(Serialize)]
struct RejectsReport<'a> {
    run_id: &'a str,
    generated_at: DateTime<Utc>,
    failed_stage: Option<Stage>,
    total: usize,
    rejections: &'a [Rejection],
}

/// Write every rejected row as pretty JSON
pub fn write_rejects(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let report = RejectsReport {
        run_id: &summary.run_id,
        generated_at: Utc::now(),
        failed_stage: summary.failed_stage,
        total: summary.rejections.len(),
        rejections: &summary.rejections,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_starts_with_every_table() {
        let summary = RunSummary::new("run-1");
        assert_eq!(summary.tables.len(), OlapTable::LOAD_ORDER.len());
        assert!(summary.is_success());
        assert_eq!(summary.total_skipped(), 0);
    }

    #[test]
    fn stage_reports_add_up() {
        let mut summary = RunSummary::new("run-1");

        let mut transform = StageReport::new(Stage::Transform);
        transform.counts_mut(OlapTable::Users).extracted = 3;
        transform.counts_mut(OlapTable::Users).transformed = 2;
        transform.reject(OlapTable::Users, "u2", RejectCategory::Malformed, "bad email");
        summary.absorb(transform);

        let mut load = StageReport::new(Stage::Load);
        load.counts_mut(OlapTable::Users).loaded = 2;
        summary.absorb(load);

        let users = summary.counts(OlapTable::Users);
        assert_eq!(
            (users.extracted, users.transformed, users.loaded, users.skipped),
            (3, 2, 2, 1)
        );
        assert_eq!(summary.rejections[0].stage, Stage::Transform);
        assert_eq!(summary.total_skipped(), 1);
    }

    #[test]
    fn rejects_file_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rejects.json");

        let mut summary = RunSummary::new("run-1");
        summary.rejections.push(Rejection {
            stage: Stage::Load,
            table: OlapTable::Places,
            key: "gm-1".into(),
            category: ConstraintKind::Check.into(),
            reason: "rating".into(),
        });
        write_rejects(&path, &summary).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["rejections"][0]["category"], "check");
        assert_eq!(value["rejections"][0]["table"], "places");
        assert_eq!(value["rejections"][0]["stage"], "load");
    }
}
