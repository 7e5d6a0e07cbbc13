use chrono::{DateTime, Utc};

use super::validate::{is_valid_email, normalize_acquisition_source};
use super::{DimensionRow, Malformed};
use crate::catalog::OlapTable;
use crate::model::UserDim;
use crate::table::RowView;

impl DimensionRow for UserDim {
    type Key = String;

    const TABLE: OlapTable = OlapTable::Users;

    const REQUIRED: &'static [&'static str] = &[
        "id",
        "email",
        "display_name",
        "avatar_url",
        "found_us_source",
        "created_at",
        "updated_at",
    ];

    fn from_row(row: &RowView<'_>) -> Result<Self, Malformed> {
        let source_user_id = row
            .text("id")
            .ok_or_else(|| Malformed::new(row, "missing id"))?;
        let email = row
            .text("email")
            .map(|e| e.to_lowercase())
            .ok_or_else(|| Malformed::new(row, "missing email"))?;
        if !is_valid_email(&email) {
            return Err(Malformed::new(row, format!("malformed email '{email}'")));
        }

        Ok(UserDim {
            source_user_id,
            email,
            display_name: row.text("display_name"),
            avatar_url: row.text("avatar_url"),
            found_us_source: row
                .text("found_us_source")
                .and_then(|s| normalize_acquisition_source(&s)),
            created_at: row.timestamp("created_at"),
            updated_at: row.timestamp("updated_at"),
        })
    }

    fn natural_key(&self) -> String {
        self.email.clone()
    }

    fn source_id(&self) -> &str {
        &self.source_user_id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
