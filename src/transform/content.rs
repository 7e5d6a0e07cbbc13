use chrono::{DateTime, Utc};

use super::validate::{non_negative_int, parse_content_url};
use super::{DimensionRow, Malformed};
use crate::catalog::OlapTable;
use crate::model::{ContentDim, ContentKey};
use crate::table::RowView;

// like_count, comment_count and uploaded_at are mapped when the source has them
impl DimensionRow for ContentDim {
    type Key = ContentKey;

    const TABLE: OlapTable = OlapTable::Content;

    const REQUIRED: &'static [&'static str] = &[
        "id",
        "url",
        "description",
        "preview_image_url",
        "created_at",
        "updated_at",
    ];

    fn from_row(row: &RowView<'_>) -> Result<Self, Malformed> {
        let source_content_id = row
            .text("id")
            .ok_or_else(|| Malformed::new(row, "missing id"))?;
        let url = row
            .text("url")
            .ok_or_else(|| Malformed::new(row, "missing url"))?;
        let key = parse_content_url(&url).map_err(|reason| Malformed::new(row, reason))?;
        let like_count =
            non_negative_int(row, "like_count").map_err(|reason| Malformed::new(row, reason))?;
        let comment_count =
            non_negative_int(row, "comment_count").map_err(|reason| Malformed::new(row, reason))?;

        Ok(ContentDim {
            source_content_id,
            key,
            url,
            thumbnail_url: row.text("preview_image_url"),
            description: row.text("description"),
            like_count,
            comment_count,
            uploaded_at: row.timestamp("uploaded_at"),
            created_at: row.timestamp("created_at"),
            updated_at: row.timestamp("updated_at"),
        })
    }

    fn natural_key(&self) -> ContentKey {
        self.key.clone()
    }

    fn source_id(&self) -> &str {
        &self.source_content_id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
