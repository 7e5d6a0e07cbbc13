//! Sample OLTP tables for transform tests

use chrono::{DateTime, TimeZone, Utc};

use crate::catalog::{self, SourceTable, TABLES_TO_EXTRACT};
use crate::source::RawExtract;
use crate::table::{Table, Value};

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn ts(day: u32) -> Value {
    Value::Timestamp(at(day))
}

/// Row with the named cells set and every other catalog column NULL
pub fn row(spec: &SourceTable, cells: Vec<(&str, Value)>) -> Vec<Value> {
    spec.column_names()
        .into_iter()
        .map(|c| {
            cells
                .iter()
                .find(|(name, _)| *name == c)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}

pub fn set(table: &mut Table, row: usize, column: &str, value: impl Into<Value>) {
    let idx = table.column_index(column).unwrap();
    table.rows[row][idx] = value.into();
}

pub fn drop_column(table: &mut Table, column: &str) {
    let idx = table.column_index(column).unwrap();
    table.columns.remove(idx);
    for row in &mut table.rows {
        row.remove(idx);
    }
}

fn build(spec: &SourceTable, rows: Vec<Vec<(&str, Value)>>) -> Table {
    let mut table = Table::new(spec.name, &spec.column_names());
    for cells in rows {
        table.push(row(spec, cells));
    }
    table
}

/// `(id, email, updated day)`
pub fn users(rows: &[(&str, &str, u32)]) -> Table {
    build(
        &catalog::USERS,
        rows.iter()
            .map(|(id, email, day)| {
                vec![
                    ("id", Value::from(*id)),
                    ("email", Value::from(*email)),
                    ("display_name", Value::from(format!("User {id}"))),
                    ("avatar_url", Value::from(format!("https://cdn.example.com/{id}.png"))),
                    ("found_us_source", Value::from("instagram")),
                    ("created_at", ts(1)),
                    ("updated_at", ts(*day)),
                ]
            })
            .collect(),
    )
}

/// `(id, url, updated day)`
pub fn contents(rows: &[(&str, &str, u32)]) -> Table {
    build(
        &catalog::CONTENTS,
        rows.iter()
            .map(|(id, url, day)| {
                vec![
                    ("id", Value::from(*id)),
                    ("url", Value::from(*url)),
                    ("title", Value::from(format!("Content {id}"))),
                    ("description", Value::from(format!("Content {id} description"))),
                    ("preview_image_url", Value::from(format!("https://cdn.example.com/{id}.jpg"))),
                    ("created_at", ts(1)),
                    ("updated_at", ts(*day)),
                ]
            })
            .collect(),
    )
}

/// `(id, google_maps_id)`
pub fn places(rows: &[(&str, &str)]) -> Table {
    build(
        &catalog::PLACES,
        rows.iter()
            .map(|(id, gmid)| {
                vec![
                    ("id", Value::from(*id)),
                    ("google_maps_id", Value::from(*gmid)),
                    ("english_display_name", Value::from(format!("Place {id}"))),
                    ("zhtw_display_name", Value::from(format!("地點 {id}"))),
                    ("rating", Value::Float(4.5)),
                    ("latitude", Value::Float(25.033)),
                    ("longitude", Value::Float(121.565)),
                    ("country_code", Value::from("TW")),
                    ("primary_type", Value::from("cafe")),
                    ("opening_hours", Value::from("9AM-5PM")),
                    ("created_at", ts(1)),
                    ("updated_at", ts(2)),
                ]
            })
            .collect(),
    )
}

/// `(id, category_type)`
pub fn properties(rows: &[(&str, &str)]) -> Table {
    build(
        &catalog::PROPERTY_MAPPING,
        rows.iter()
            .map(|(id, category)| {
                vec![
                    ("id", Value::from(*id)),
                    ("slug", Value::from(*id)),
                    ("english_display_name", Value::from(format!("Property {id}"))),
                    ("zhtw_display_name", Value::from(format!("屬性 {id}"))),
                    ("category_type", Value::from(*category)),
                    ("is_active", Value::Bool(true)),
                    ("emoji", Value::from("🏆")),
                    ("created_at", ts(1)),
                    ("updated_at", ts(2)),
                ]
            })
            .collect(),
    )
}

/// `(user_id, content_id, is_deleted, day)`
pub fn user_contents(rows: &[(&str, &str, bool, u32)]) -> Table {
    build(
        &catalog::USER_CONTENTS,
        rows.iter()
            .map(|(user, content, deleted, day)| {
                vec![
                    ("user_id", Value::from(*user)),
                    ("content_id", Value::from(*content)),
                    ("status", Value::from("saved")),
                    ("is_deleted", Value::Bool(*deleted)),
                    ("created_at", ts(*day)),
                    ("updated_at", ts(*day + 1)),
                ]
            })
            .collect(),
    )
}

/// `(content_id, place_id, is_deleted)`
pub fn content_places(rows: &[(&str, &str, bool)]) -> Table {
    build(
        &catalog::CONTENT_PLACES,
        rows.iter()
            .map(|(content, place, deleted)| {
                vec![
                    ("content_id", Value::from(*content)),
                    ("place_id", Value::from(*place)),
                    ("is_deleted", Value::Bool(*deleted)),
                    ("created_at", ts(1)),
                    ("updated_at", ts(1)),
                ]
            })
            .collect(),
    )
}

/// `(place_id, property_id, is_deleted)`
pub fn place_properties(rows: &[(&str, &str, bool)]) -> Table {
    build(
        &catalog::PLACE_PROPERTIES,
        rows.iter()
            .map(|(place, property, deleted)| {
                vec![
                    ("place_id", Value::from(*place)),
                    ("property_id", Value::from(*property)),
                    ("is_deleted", Value::Bool(*deleted)),
                    ("created_at", ts(1)),
                    ("updated_at", ts(1)),
                ]
            })
            .collect(),
    )
}

/// A small consistent extract: two users sharing one reel tagged at one place
pub fn sample_extract() -> RawExtract {
    let mut raw = RawExtract::new();
    raw.insert(users(&[
        ("u1", "Alice@Example.com", 2),
        ("u2", "bob@example.com", 2),
    ]));
    raw.insert(contents(&[("c1", "https://www.instagram.com/reel/Cabc123/", 2)]));
    raw.insert(places(&[("p1", "ChIJ-taipei-101")]));
    raw.insert(properties(&[("pr1", "award")]));
    raw.insert(user_contents(&[
        ("u1", "c1", false, 3),
        ("u2", "c1", false, 4),
        ("u1", "c1", false, 6),
    ]));
    raw.insert(content_places(&[("c1", "p1", false)]));
    raw.insert(place_properties(&[("p1", "pr1", false)]));
    debug_assert_eq!(raw.table_names().count(), TABLES_TO_EXTRACT.len());
    raw
}
