//! Column catalogs for the OLTP source and the OLAP star schema

use crate::table::ColumnKind::{self, Boolean, Float, Integer, Text, Timestamp};

/// A source table and the columns extracted from it
///
/// Connectors select the listed columns that exist in the source; columns
/// missing from the source are left out of the extracted table, so the
/// transform stage decides which of them are required.
#[derive(Debug, Clone, Copy)]
pub struct SourceTable {
    pub name: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
}

impl SourceTable {
    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(name, _)| *name).collect()
    }
}

pub const USERS: SourceTable = SourceTable {
    name: "users",
    columns: &[
        ("id", Text),
        ("email", Text),
        ("display_name", Text),
        ("first_name", Text),
        ("last_name", Text),
        ("avatar_url", Text),
        ("gender", Text),
        ("provider", Text),
        ("found_us_source", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const CONTENTS: SourceTable = SourceTable {
    name: "contents",
    columns: &[
        ("id", Text),
        ("url", Text),
        ("html", Text),
        ("title", Text),
        ("description", Text),
        ("site_name", Text),
        ("icon_url", Text),
        ("preview_image_url", Text),
        ("status", Text),
        ("like_count", Integer),
        ("comment_count", Integer),
        ("uploaded_at", Timestamp),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const PLACES: SourceTable = SourceTable {
    name: "places",
    columns: &[
        ("id", Text),
        ("google_maps_id", Text),
        ("english_display_name", Text),
        ("zhtw_display_name", Text),
        ("english_address", Text),
        ("zhtw_address", Text),
        ("phone_number", Text),
        ("rating", Float),
        ("latitude", Float),
        ("longitude", Float),
        ("photo_urls", Text),
        ("google_map_url", Text),
        ("website_url", Text),
        ("primary_type", Text),
        ("opening_hours", Text),
        ("country_code", Text),
        ("english_administrative_area", Text),
        ("zhtw_administrative_area", Text),
        ("english_locality", Text),
        ("zhtw_locality", Text),
        ("report", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const PROPERTY_MAPPING: SourceTable = SourceTable {
    name: "property_mapping",
    columns: &[
        ("id", Text),
        ("slug", Text),
        ("english_display_name", Text),
        ("zhtw_display_name", Text),
        ("english_description", Text),
        ("zhtw_description", Text),
        ("category_type", Text),
        ("source", Text),
        ("source_url", Text),
        ("is_active", Boolean),
        ("emoji", Text),
        ("cover_img_url", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const USER_CONTENTS: SourceTable = SourceTable {
    name: "user_contents",
    columns: &[
        ("user_id", Text),
        ("content_id", Text),
        ("status", Text),
        ("is_deleted", Boolean),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const CONTENT_PLACES: SourceTable = SourceTable {
    name: "content_places",
    columns: &[
        ("content_id", Text),
        ("place_id", Text),
        ("is_deleted", Boolean),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

pub const PLACE_PROPERTIES: SourceTable = SourceTable {
    name: "place_properties",
    columns: &[
        ("place_id", Text),
        ("property_id", Text),
        ("is_deleted", Boolean),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
};

/// Tables read by the extract stage, in extraction order
pub const TABLES_TO_EXTRACT: [SourceTable; 7] = [
    USERS,
    CONTENTS,
    PLACES,
    PROPERTY_MAPPING,
    USER_CONTENTS,
    CONTENT_PLACES,
    PLACE_PROPERTIES,
];

pub fn source_table(name: &str) -> Option<SourceTable> {
    TABLES_TO_EXTRACT.into_iter().find(|t| t.name == name)
}

/// Warehouse tables, in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OlapTable {
    Users,
    Content,
    Places,
    Property,
    Interactions,
}

impl OlapTable {
    pub const LOAD_ORDER: [OlapTable; 5] = [
        OlapTable::Users,
        OlapTable::Content,
        OlapTable::Places,
        OlapTable::Property,
        OlapTable::Interactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OlapTable::Users => "users",
            OlapTable::Content => "content",
            OlapTable::Places => "places",
            OlapTable::Property => "property",
            OlapTable::Interactions => "interactions",
        }
    }

    /// Columns written by the load stage (surrogate `id` excluded)
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            OlapTable::Users => &[
                "source_user_id",
                "email",
                "display_name",
                "avatar_url",
                "found_us_source",
                "created_at",
                "updated_at",
            ],
            OlapTable::Content => &[
                "source_content_id",
                "platform",
                "platform_id",
                "url",
                "thumbnail_url",
                "description",
                "like_count",
                "comment_count",
                "uploaded_at",
                "created_at",
                "updated_at",
            ],
            OlapTable::Places => &[
                "source_place_id",
                "google_maps_id",
                "english_display_name",
                "zhtw_display_name",
                "english_address",
                "zhtw_address",
                "phone_number",
                "rating",
                "latitude",
                "longitude",
                "country_code",
                "english_administrative_area",
                "zhtw_administrative_area",
                "english_locality",
                "zhtw_locality",
                "primary_type",
                "created_at",
                "updated_at",
            ],
            OlapTable::Property => &[
                "source_property_id",
                "english_name",
                "zhtw_name",
                "emoji",
                "category_type",
                "created_at",
                "updated_at",
            ],
            OlapTable::Interactions => &[
                "user_id",
                "content_id",
                "place_id",
                "property_id",
                "interaction_count",
                "first_interaction_at",
                "last_interaction_at",
            ],
        }
    }

    /// Source table whose rows count as this table's extracted rows
    pub fn fed_by(&self) -> &'static SourceTable {
        match self {
            OlapTable::Users => &USERS,
            OlapTable::Content => &CONTENTS,
            OlapTable::Places => &PLACES,
            OlapTable::Property => &PROPERTY_MAPPING,
            OlapTable::Interactions => &USER_CONTENTS,
        }
    }

    /// Whether the table carries an auto-generated surrogate `id`
    pub fn has_surrogate_id(&self) -> bool {
        !matches!(self, OlapTable::Interactions)
    }
}

impl std::fmt::Display for OlapTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_extracted_table_has_unique_columns() {
        for table in TABLES_TO_EXTRACT {
            let mut names = table.column_names();
            let count = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), count, "duplicate column in {}", table.name);
        }
    }

    #[test]
    fn junction_tables_carry_soft_delete_flag() {
        for name in ["user_contents", "content_places", "place_properties"] {
            let table = source_table(name).unwrap();
            assert!(table.column_names().contains(&"is_deleted"), "{name}");
        }
    }

    #[test]
    fn interactions_are_fed_by_user_events() {
        assert_eq!(OlapTable::Interactions.fed_by().name, "user_contents");
        assert_eq!(OlapTable::Property.fed_by().name, "property_mapping");
    }

    #[test]
    fn fact_table_is_loaded_last() {
        assert_eq!(OlapTable::LOAD_ORDER.last(), Some(&OlapTable::Interactions));
    }
}
