use chrono::{DateTime, Utc};

use super::validate::{emoji_fits, MAX_EMOJI_CHARS};
use super::{DimensionRow, Malformed};
use crate::catalog::OlapTable;
use crate::model::{CategoryType, PropertyDim};
use crate::table::RowView;

impl DimensionRow for PropertyDim {
    type Key = String;

    const TABLE: OlapTable = OlapTable::Property;

    const REQUIRED: &'static [&'static str] = &[
        "id",
        "english_display_name",
        "zhtw_display_name",
        "category_type",
        "emoji",
        "created_at",
        "updated_at",
    ];

    fn from_row(row: &RowView<'_>) -> Result<Self, Malformed> {
        let source_property_id = row
            .text("id")
            .ok_or_else(|| Malformed::new(row, "missing id"))?;
        let raw_category = row.text("category_type").unwrap_or_default();
        let category_type = CategoryType::parse(&raw_category).ok_or_else(|| {
            Malformed::new(row, format!("unknown category_type '{raw_category}'"))
        })?;
        let emoji = row.text("emoji");
        if let Some(e) = emoji.as_deref().filter(|e| !emoji_fits(e)) {
            return Err(Malformed::new(
                row,
                format!("emoji '{e}' longer than {MAX_EMOJI_CHARS} characters"),
            ));
        }

        Ok(PropertyDim {
            source_property_id,
            english_name: row.text("english_display_name"),
            zhtw_name: row.text("zhtw_display_name"),
            emoji,
            category_type,
            created_at: row.timestamp("created_at"),
            updated_at: row.timestamp("updated_at"),
        })
    }

    fn natural_key(&self) -> String {
        self.source_property_id.clone()
    }

    fn source_id(&self) -> &str {
        &self.source_property_id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
