//! Load stage: transformed rows into the warehouse
//!
//! Dimensions go first, in dependency order, so their surrogate ids are
//! known before any fact is written. A row the warehouse refuses is
//! dropped and the load carries on; losing the connection stops the stage.

use std::collections::HashMap;
use std::hash::Hash;

use crate::catalog::OlapTable;
use crate::error::{EtlError, Result};
use crate::model::{ContentKey, InteractionFact, ResolvedInteraction};
use crate::report::{RejectCategory, StageReport};
use crate::store::Warehouse;
use crate::transform::Transformed;

/// Counts and rejections of the load stage
pub type LoadReport = StageReport;

/// Surrogate ids of the dimension rows written in this run
#[derive(Debug, Default)]
struct LoadedIds {
    users: HashMap<String, i64>,
    content: HashMap<ContentKey, i64>,
    places: HashMap<String, i64>,
    properties: HashMap<String, i64>,
}

impl LoadedIds {
    fn resolve(&self, fact: &InteractionFact) -> std::result::Result<ResolvedInteraction, String> {
        let user_id = self
            .users
            .get(&fact.user_email)
            .ok_or_else(|| format!("user {} was not loaded", fact.user_email))?;
        let content_id = self
            .content
            .get(&fact.content)
            .ok_or_else(|| format!("content {} was not loaded", fact.content))?;
        let place_id = self
            .places
            .get(&fact.google_maps_id)
            .ok_or_else(|| format!("place {} was not loaded", fact.google_maps_id))?;
        let property_id = self
            .properties
            .get(&fact.source_property_id)
            .ok_or_else(|| format!("property {} was not loaded", fact.source_property_id))?;

        Ok(ResolvedInteraction {
            user_id: *user_id,
            content_id: *content_id,
            place_id: *place_id,
            property_id: *property_id,
            interaction_count: fact.interaction_count,
            first_interaction_at: fact.first_interaction_at,
            last_interaction_at: fact.last_interaction_at,
        })
    }
}

/// Record a row-scoped failure, pass anything else through.
fn absorb_row_error(
    report: &mut LoadReport,
    table: OlapTable,
    key: impl Into<String>,
    err: EtlError,
) -> Result<()> {
    match err {
        EtlError::Constraint { kind, detail, .. } => {
            report.reject(table, key, RejectCategory::from(kind), detail);
            Ok(())
        }
        EtlError::Query { message, .. } => {
            report.reject(table, key, RejectCategory::DataError, message);
            Ok(())
        }
        other => Err(other),
    }
}

fn load_dimension<D, K>(
    warehouse: &mut dyn Warehouse,
    table: OlapTable,
    rows: &[D],
    batch_size: usize,
    report: &mut LoadReport,
    upsert: fn(&mut dyn Warehouse, &D) -> Result<i64>,
    natural_key: fn(&D) -> K,
) -> Result<HashMap<K, i64>>
where
    K: Eq + Hash + ToString,
{
    let mut ids = HashMap::with_capacity(rows.len());
    let batches = rows.len().div_ceil(batch_size);

    for (n, batch) in rows.chunks(batch_size).enumerate() {
        for row in batch {
            let key = natural_key(row);
            match upsert(warehouse, row) {
                Ok(id) => {
                    ids.insert(key, id);
                    report.counts_mut(table).loaded += 1;
                }
                Err(e) => absorb_row_error(report, table, key.to_string(), e)?,
            }
        }
        tracing::debug!(%table, batch = n + 1, of = batches, "loaded batch");
    }

    let counts = report.counts(table);
    tracing::info!(%table, loaded = counts.loaded, skipped = counts.skipped, "loaded dimension");
    Ok(ids)
}

fn load_interactions(
    warehouse: &mut dyn Warehouse,
    facts: &[InteractionFact],
    ids: &LoadedIds,
    batch_size: usize,
    report: &mut LoadReport,
) -> Result<()> {
    let table = OlapTable::Interactions;
    let batches = facts.len().div_ceil(batch_size);

    for (n, batch) in facts.chunks(batch_size).enumerate() {
        for fact in batch {
            let resolved = match ids.resolve(fact) {
                Ok(resolved) => resolved,
                Err(reason) => {
                    report.reject(table, fact.key_label(), RejectCategory::ForeignKey, reason);
                    continue;
                }
            };
            match warehouse.upsert_interaction(&resolved) {
                Ok(()) => report.counts_mut(table).loaded += 1,
                Err(e) => absorb_row_error(report, table, fact.key_label(), e)?,
            }
        }
        tracing::debug!(%table, batch = n + 1, of = batches, "loaded batch");
    }

    let counts = report.counts(table);
    tracing::info!(%table, loaded = counts.loaded, skipped = counts.skipped, "loaded facts");
    Ok(())
}

/// Write everything in `data` to the warehouse.
///
/// Counts land in `report` as they happen, so a failed load still leaves
/// an accurate partial picture behind.
pub fn load(
    warehouse: &mut dyn Warehouse,
    data: &Transformed,
    batch_size: usize,
    report: &mut LoadReport,
) -> Result<()> {
    let batch_size = batch_size.max(1);
    warehouse.ensure_schema()?;

    let ids = LoadedIds {
        users: load_dimension(
            warehouse,
            OlapTable::Users,
            &data.users,
            batch_size,
            report,
            |w, row| w.upsert_user(row),
            |row| row.email.clone(),
        )?,
        content: load_dimension(
            warehouse,
            OlapTable::Content,
            &data.content,
            batch_size,
            report,
            |w, row| w.upsert_content(row),
            |row| row.key.clone(),
        )?,
        places: load_dimension(
            warehouse,
            OlapTable::Places,
            &data.places,
            batch_size,
            report,
            |w, row| w.upsert_place(row),
            |row| row.google_maps_id.clone(),
        )?,
        properties: load_dimension(
            warehouse,
            OlapTable::Property,
            &data.properties,
            batch_size,
            report,
            |w, row| w.upsert_property(row),
            |row| row.source_property_id.clone(),
        )?,
    };

    load_interactions(warehouse, &data.interactions, &ids, batch_size, report)
}
