use chrono::{DateTime, Utc};

use super::validate::bounded_float;
use super::{DimensionRow, Malformed};
use crate::catalog::OlapTable;
use crate::model::PlaceDim;
use crate::table::RowView;

impl DimensionRow for PlaceDim {
    type Key = String;

    const TABLE: OlapTable = OlapTable::Places;

    const REQUIRED: &'static [&'static str] = &[
        "id",
        "google_maps_id",
        "english_display_name",
        "zhtw_display_name",
        "english_address",
        "zhtw_address",
        "phone_number",
        "rating",
        "latitude",
        "longitude",
        "primary_type",
        "country_code",
        "english_administrative_area",
        "zhtw_administrative_area",
        "english_locality",
        "zhtw_locality",
        "created_at",
        "updated_at",
    ];

    fn from_row(row: &RowView<'_>) -> Result<Self, Malformed> {
        let bad = |reason: String| Malformed::new(row, reason);

        let source_place_id = row
            .text("id")
            .ok_or_else(|| bad("missing id".into()))?;
        let google_maps_id = row
            .text("google_maps_id")
            .ok_or_else(|| bad("missing google_maps_id".into()))?;
        let rating = bounded_float(row, "rating", 0.0, 5.0).map_err(bad)?;
        let latitude = bounded_float(row, "latitude", -90.0, 90.0).map_err(bad)?;
        let longitude = bounded_float(row, "longitude", -180.0, 180.0).map_err(bad)?;

        Ok(PlaceDim {
            source_place_id,
            google_maps_id,
            english_display_name: row.text("english_display_name"),
            zhtw_display_name: row.text("zhtw_display_name"),
            english_address: row.text("english_address"),
            zhtw_address: row.text("zhtw_address"),
            phone_number: row.text("phone_number"),
            rating,
            latitude,
            longitude,
            country_code: row.text("country_code"),
            english_administrative_area: row.text("english_administrative_area"),
            zhtw_administrative_area: row.text("zhtw_administrative_area"),
            english_locality: row.text("english_locality"),
            zhtw_locality: row.text("zhtw_locality"),
            primary_type: row.text("primary_type"),
            created_at: row.timestamp("created_at"),
            updated_at: row.timestamp("updated_at"),
        })
    }

    fn natural_key(&self) -> String {
        self.google_maps_id.clone()
    }

    fn source_id(&self) -> &str {
        &self.source_place_id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
