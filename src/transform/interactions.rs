//! Fact aggregation
//!
//! `user_contents ⋈ content_places ⋈ place_properties`, resolved through the
//! dimension id maps. Junction rows are relationships and are applied as
//! sets; only `user_contents` rows are counted as interaction events.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::TransformReport;
use crate::catalog::OlapTable;
use crate::error::Result;
use crate::model::{ContentKey, InteractionFact};
use crate::report::RejectCategory;
use crate::table::{RowView, Table};

const FACT: OlapTable = OlapTable::Interactions;

const USER_CONTENTS_REQUIRED: &[&str] = &["user_id", "content_id", "created_at", "updated_at"];
const CONTENT_PLACES_REQUIRED: &[&str] = &["content_id", "place_id"];
const PLACE_PROPERTIES_REQUIRED: &[&str] = &["place_id", "property_id"];

/// Source id to natural key, per dimension
#[derive(Debug, Clone, Copy)]
pub struct SourceIdMaps<'a> {
    pub users: &'a HashMap<String, String>,
    pub content: &'a HashMap<String, ContentKey>,
    pub places: &'a HashMap<String, String>,
    pub properties: &'a HashMap<String, String>,
}

type FactKey = (String, ContentKey, String, String);

struct Measures {
    count: i64,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
}

fn is_deleted(row: &RowView<'_>) -> bool {
    row.bool("is_deleted").unwrap_or(false)
}

/// Outcome of reading one junction row
enum Link<A, B> {
    Deleted,
    Resolved(A, B),
    Dropped,
}

/// Resolve both ends of a junction row, rejecting it when either is unknown.
fn resolve_link<'m, A, B>(
    row: &RowView<'_>,
    table: &str,
    (left_col, left_map, left_name): (&str, &'m HashMap<String, A>, &str),
    (right_col, right_map, right_name): (&str, &'m HashMap<String, B>, &str),
    report: &mut TransformReport,
) -> Link<&'m A, &'m B> {
    if is_deleted(row) {
        return Link::Deleted;
    }
    let (left, right) = match (row.text(left_col), row.text(right_col)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            report.reject(
                FACT,
                format!("{table} row {}", row.index + 1),
                RejectCategory::Malformed,
                format!("missing {left_col} or {right_col}"),
            );
            return Link::Dropped;
        }
    };
    let key = format!("{table} {left}/{right}");

    let Some(l) = left_map.get(&left) else {
        report.reject(
            FACT,
            key,
            RejectCategory::Orphan,
            format!("{left_name} '{left}' not found"),
        );
        return Link::Dropped;
    };
    let Some(r) = right_map.get(&right) else {
        report.reject(
            FACT,
            key,
            RejectCategory::Orphan,
            format!("{right_name} '{right}' not found"),
        );
        return Link::Dropped;
    };
    Link::Resolved(l, r)
}

/// Build fact rows from the three junction tables.
pub(crate) fn aggregate(
    user_contents: &Table,
    content_places: &Table,
    place_properties: &Table,
    maps: &SourceIdMaps<'_>,
    report: &mut TransformReport,
) -> Result<Vec<InteractionFact>> {
    user_contents.require_columns(USER_CONTENTS_REQUIRED)?;
    content_places.require_columns(CONTENT_PLACES_REQUIRED)?;
    place_properties.require_columns(PLACE_PROPERTIES_REQUIRED)?;

    report.counts_mut(FACT).extracted += user_contents.len();

    let mut places_by_content: HashMap<&ContentKey, BTreeSet<&str>> = HashMap::new();
    for row in content_places.iter() {
        match resolve_link(
            &row,
            "content_places",
            ("content_id", maps.content, "content"),
            ("place_id", maps.places, "place"),
            report,
        ) {
            Link::Resolved(content, place) => {
                places_by_content
                    .entry(content)
                    .or_default()
                    .insert(place.as_str());
            }
            Link::Deleted => report.counts_mut(FACT).excluded += 1,
            Link::Dropped => {}
        }
    }

    let mut properties_by_place: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for row in place_properties.iter() {
        match resolve_link(
            &row,
            "place_properties",
            ("place_id", maps.places, "place"),
            ("property_id", maps.properties, "property"),
            report,
        ) {
            Link::Resolved(place, property) => {
                properties_by_place
                    .entry(place.as_str())
                    .or_default()
                    .insert(property.as_str());
            }
            Link::Deleted => report.counts_mut(FACT).excluded += 1,
            Link::Dropped => {}
        }
    }

    let mut facts: BTreeMap<FactKey, Measures> = BTreeMap::new();
    let mut unlinked = 0usize;
    for row in user_contents.iter() {
        let (email, content) = match resolve_link(
            &row,
            "user_contents",
            ("user_id", maps.users, "user"),
            ("content_id", maps.content, "content"),
            report,
        ) {
            Link::Resolved(email, content) => (email, content),
            Link::Deleted => {
                report.counts_mut(FACT).excluded += 1;
                continue;
            }
            Link::Dropped => continue,
        };

        let observed: Vec<DateTime<Utc>> = [row.timestamp("created_at"), row.timestamp("updated_at")]
            .into_iter()
            .flatten()
            .collect();
        let (Some(first), Some(last)) = (observed.iter().min(), observed.iter().max()) else {
            report.reject(
                FACT,
                format!("user_contents {email}/{content}"),
                RejectCategory::Malformed,
                "event has no timestamp",
            );
            continue;
        };

        let mut linked = false;
        let places = places_by_content.get(content).into_iter().flatten();
        for place in places {
            let Some(properties) = properties_by_place.get(place) else {
                continue;
            };
            for property in properties {
                linked = true;
                let key = (
                    email.clone(),
                    content.clone(),
                    place.to_string(),
                    property.to_string(),
                );
                facts
                    .entry(key)
                    .and_modify(|m| {
                        m.count += 1;
                        m.first = m.first.min(*first);
                        m.last = m.last.max(*last);
                    })
                    .or_insert(Measures {
                        count: 1,
                        first: *first,
                        last: *last,
                    });
            }
        }
        if !linked {
            unlinked += 1;
        }
    }

    // events that reach no (place, property) pair produce no fact
    if unlinked > 0 {
        report.counts_mut(FACT).excluded += unlinked;
        tracing::debug!(events = unlinked, "events on content without tagged properties");
    }

    let interactions: Vec<InteractionFact> = facts
        .into_iter()
        .map(|((user_email, content, google_maps_id, source_property_id), m)| InteractionFact {
            user_email,
            content,
            google_maps_id,
            source_property_id,
            interaction_count: m.count,
            first_interaction_at: m.first,
            last_interaction_at: m.last,
        })
        .collect();

    report.counts_mut(FACT).transformed += interactions.len();
    tracing::info!(rows = interactions.len(), "aggregated interactions");
    Ok(interactions)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{self, at, drop_column, sample_extract};
    use super::super::transform;
    use super::*;
    use crate::report::Stage;
    use crate::error::EtlError;
    use crate::model::Platform;

    struct Maps {
        users: HashMap<String, String>,
        content: HashMap<String, ContentKey>,
        places: HashMap<String, String>,
        properties: HashMap<String, String>,
    }

    impl Maps {
        fn new() -> Self {
            let key = |id: &str| ContentKey {
                platform: Platform::Instagram,
                platform_id: id.to_string(),
            };
            let map = |pairs: &[(&str, &str)]| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>()
            };
            Self {
                users: map(&[("u1", "a@example.com"), ("u1-dup", "a@example.com"), ("u2", "b@example.com")]),
                content: [("c1", key("AAA")), ("c2", key("BBB"))]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                places: map(&[("p1", "gm-1"), ("p2", "gm-2")]),
                properties: map(&[("pr1", "pr1"), ("pr2", "pr2")]),
            }
        }

        fn borrow(&self) -> SourceIdMaps<'_> {
            SourceIdMaps {
                users: &self.users,
                content: &self.content,
                places: &self.places,
                properties: &self.properties,
            }
        }
    }

    #[test]
    fn repeated_events_are_aggregated() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u1", "c1", false, 3), ("u1-dup", "c1", false, 10), ("u1", "c1", false, 5)]),
            &fixtures::content_places(&[("c1", "p1", false)]),
            &fixtures::place_properties(&[("p1", "pr1", false)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();

        assert_eq!(facts.len(), 1);
        let fact = &facts[0];
        assert_eq!(fact.user_email, "a@example.com");
        assert_eq!(fact.interaction_count, 3);
        assert_eq!(fact.first_interaction_at, at(3));
        assert_eq!(fact.last_interaction_at, at(11));
    }

    #[test]
    fn events_expand_across_places_and_properties() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u1", "c1", false, 3), ("u2", "c2", false, 3)]),
            &fixtures::content_places(&[("c1", "p1", false), ("c1", "p2", false), ("c1", "p2", false)]),
            &fixtures::place_properties(&[("p1", "pr1", false), ("p1", "pr2", false), ("p2", "pr1", false)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();

        assert_eq!(facts.len(), 3);
        assert!(facts.iter().all(|f| f.interaction_count == 1));
        assert_eq!(report.counts(OlapTable::Interactions).transformed, 3);
    }

    #[test]
    fn soft_deleted_rows_are_excluded() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u1", "c1", true, 3), ("u2", "c1", false, 3)]),
            &fixtures::content_places(&[("c1", "p1", false), ("c1", "p2", true)]),
            &fixtures::place_properties(&[("p1", "pr1", false), ("p1", "pr2", true)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].user_email, "b@example.com");
        assert_eq!(facts[0].google_maps_id, "gm-1");
        assert_eq!(facts[0].source_property_id, "pr1");
        assert_eq!(report.counts(OlapTable::Interactions).excluded, 3);
        assert!(report.rejections.is_empty());
    }

    #[test]
    fn unknown_place_is_dropped_as_orphan() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u1", "c1", false, 3)]),
            &fixtures::content_places(&[("c1", "p-missing", false)]),
            &fixtures::place_properties(&[("p1", "pr1", false)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();

        assert!(facts.is_empty());
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].category, RejectCategory::Orphan);
        assert_eq!(report.rejections[0].key, "content_places c1/p-missing");
        assert_eq!(report.counts(OlapTable::Interactions).skipped, 1);
    }

    #[test]
    fn unknown_user_is_dropped_as_orphan() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u-gone", "c1", false, 3)]),
            &fixtures::content_places(&[("c1", "p1", false)]),
            &fixtures::place_properties(&[("p1", "pr1", false)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();
        assert!(facts.is_empty());
        assert!(report.rejections[0].reason.contains("user 'u-gone'"));
    }

    #[test]
    fn missing_junction_column_fails() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let mut user_contents = fixtures::user_contents(&[("u1", "c1", false, 3)]);
        drop_column(&mut user_contents, "content_id");
        let err = aggregate(
            &user_contents,
            &fixtures::content_places(&[]),
            &fixtures::place_properties(&[]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::MissingColumns { .. }));
    }

    #[test]
    fn full_transform_of_sample_extract() {
        let (out, report) = transform(&sample_extract()).unwrap();

        assert_eq!(out.users.len(), 2);
        assert_eq!(out.users[0].email, "alice@example.com");
        assert_eq!(out.interactions.len(), 2);

        let alice = out
            .interactions
            .iter()
            .find(|f| f.user_email == "alice@example.com")
            .unwrap();
        assert_eq!(alice.interaction_count, 2);
        assert_eq!(alice.first_interaction_at, at(3));
        assert_eq!(alice.last_interaction_at, at(7));
        assert_eq!(alice.content.platform_id, "Cabc123");
        assert_eq!(alice.google_maps_id, "ChIJ-taipei-101");

        let counts = report.counts(OlapTable::Interactions);
        assert_eq!((counts.extracted, counts.transformed), (3, 2));
    }

    #[test]
    fn events_without_place_properties_are_excluded() {
        let maps = Maps::new();
        let mut report = TransformReport::new(Stage::Transform);
        let facts = aggregate(
            &fixtures::user_contents(&[("u1", "c1", false, 3), ("u2", "c2", false, 3), ("u2", "c1", false, 4)]),
            &fixtures::content_places(&[("c1", "p1", false), ("c1", "p2", false)]),
            &fixtures::place_properties(&[("p2", "pr1", false)]),
            &maps.borrow(),
            &mut report,
        )
        .unwrap();

        // c2 has no places; p1 has no properties but p2 does
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|f| f.google_maps_id == "gm-2"));
        let counts = report.counts(OlapTable::Interactions);
        assert_eq!((counts.transformed, counts.excluded, counts.skipped), (2, 1, 0));
        assert!(report.rejections.is_empty());
    }
}
