//! Orchestrator
//!
//! Runs extract, transform and load in sequence under one run id. A stage
//! failure stops the run; the summary collected so far is still returned.

use chrono::Utc;
use uuid::Uuid;

use crate::catalog::OlapTable;
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::load::{load, LoadReport};
use crate::report::{RunSummary, Stage};
use crate::source::{extract_all, open_source, RawExtract};
use crate::store::open_warehouse;
use crate::transform::{transform, Transformed};

fn at(stage: Stage) -> impl FnOnce(EtlError) -> (Stage, EtlError) {
    move |err| (stage, err)
}

/// Extract through a connection that lives only as long as this call.
fn extract(config: &Config, raw: &mut RawExtract) -> Result<()> {
    let endpoint = config.oltp.endpoint()?;
    let mut source = open_source(&endpoint)?;
    tracing::info!(source = %source.description(), "extracting");
    extract_all(source.as_mut(), raw)
}

fn load_into_warehouse(config: &Config, data: &Transformed, report: &mut LoadReport) -> Result<()> {
    let endpoint = config.olap.endpoint()?;
    let mut warehouse = open_warehouse(&endpoint)?;
    tracing::info!(warehouse = warehouse.id(), target = %endpoint.describe(), "loading");
    load(warehouse.as_mut(), data, config.load.batch_size, report)
}

/// Extracted row counts straight from the raw tables
fn record_extracted(summary: &mut RunSummary, raw: &RawExtract) {
    for table in OlapTable::LOAD_ORDER {
        let rows = raw.row_count(table.fed_by().name);
        summary.tables.entry(table).or_default().extracted += rows;
    }
}

fn execute(config: &Config, summary: &mut RunSummary) -> Result<(), (Stage, EtlError)> {
    let mut raw = RawExtract::new();
    if let Err(err) = extract(config, &mut raw) {
        record_extracted(summary, &raw);
        return Err((Stage::Extract, err));
    }

    let data = match transform(&raw) {
        Ok((data, report)) => {
            summary.absorb(report);
            data
        }
        Err(err) => {
            record_extracted(summary, &raw);
            return Err((Stage::Transform, err));
        }
    };
    drop(raw);

    let mut report = LoadReport::new(Stage::Load);
    let result = load_into_warehouse(config, &data, &mut report);
    summary.absorb(report);
    result.map_err(at(Stage::Load))
}

/// Run the whole pipeline once.
pub fn run(config: &Config) -> RunSummary {
    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("etl", run_id = %run_id);
    let _entered = span.enter();

    let mut summary = RunSummary::new(run_id);
    tracing::info!("run started");

    match execute(config, &mut summary) {
        Ok(()) => tracing::info!(skipped = summary.total_skipped(), "run complete"),
        Err((stage, err)) => {
            tracing::error!(%stage, error = %err, "run failed");
            summary.failed_stage = Some(stage);
            summary.error = Some(err.to_string());
        }
    }

    summary.finished_at = Some(Utc::now());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    fn sqlite(path: &std::path::Path) -> DatabaseConfig {
        DatabaseConfig {
            url: Some(format!("sqlite://{}", path.display())),
            ..DatabaseConfig::olap_default()
        }
    }

    #[test]
    fn missing_source_fails_in_extract() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            oltp: sqlite(&dir.path().join("absent.db")),
            olap: sqlite(&dir.path().join("olap.db")),
            ..Config::default()
        };

        let summary = run(&config);
        assert_eq!(summary.failed_stage, Some(Stage::Extract));
        assert!(summary.error.unwrap().contains("absent.db"));
        assert!(summary.finished_at.is_some());
        assert!(summary.tables.values().all(|c| *c == Default::default()));
        // the warehouse is never touched
        assert!(!dir.path().join("olap.db").exists());
    }

    #[test]
    fn run_ids_are_unique() {
        let config = Config {
            oltp: DatabaseConfig {
                url: Some("mysql://nope/db".into()),
                ..DatabaseConfig::oltp_default()
            },
            ..Config::default()
        };
        let a = run(&config);
        let b = run(&config);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.failed_stage, Some(Stage::Extract));
    }
}
