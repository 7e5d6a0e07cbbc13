//! Star-schema row types
//!
//! Dimension rows carry their natural key; surrogate ids only exist once a
//! row has been written to the warehouse.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// How a user found the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionSource {
    Instagram,
    Tiktok,
    Youtube,
    Threads,
    Friends,
    WebSummit,
    AppStore,
    Organic,
    Other,
}

impl AcquisitionSource {
    pub const ALL: [AcquisitionSource; 9] = [
        AcquisitionSource::Instagram,
        AcquisitionSource::Tiktok,
        AcquisitionSource::Youtube,
        AcquisitionSource::Threads,
        AcquisitionSource::Friends,
        AcquisitionSource::WebSummit,
        AcquisitionSource::AppStore,
        AcquisitionSource::Organic,
        AcquisitionSource::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionSource::Instagram => "instagram",
            AcquisitionSource::Tiktok => "tiktok",
            AcquisitionSource::Youtube => "youtube",
            AcquisitionSource::Threads => "threads",
            AcquisitionSource::Friends => "friends",
            AcquisitionSource::WebSummit => "web_summit",
            AcquisitionSource::AppStore => "app_store",
            AcquisitionSource::Organic => "organic",
            AcquisitionSource::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

/// Social platform hosting a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Tiktok,
    Youtube,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Tiktok, Platform::Youtube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == raw)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Label,
    Ranking,
    Award,
    Campaign,
}

impl CategoryType {
    pub const ALL: [CategoryType; 4] = [
        CategoryType::Label,
        CategoryType::Ranking,
        CategoryType::Award,
        CategoryType::Campaign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Label => "label",
            CategoryType::Ranking => "ranking",
            CategoryType::Award => "award",
            CategoryType::Campaign => "campaign",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

/// Natural key of a content row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    pub platform: Platform,
    pub platform_id: String,
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.platform_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserDim {
    pub source_user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub found_us_source: Option<AcquisitionSource>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentDim {
    pub source_content_id: String,
    pub key: ContentKey,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDim {
    pub source_place_id: String,
    pub google_maps_id: String,
    pub english_display_name: Option<String>,
    pub zhtw_display_name: Option<String>,
    pub english_address: Option<String>,
    pub zhtw_address: Option<String>,
    pub phone_number: Option<String>,
    pub rating: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
    pub english_administrative_area: Option<String>,
    pub zhtw_administrative_area: Option<String>,
    pub english_locality: Option<String>,
    pub zhtw_locality: Option<String>,
    pub primary_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDim {
    pub source_property_id: String,
    pub english_name: Option<String>,
    pub zhtw_name: Option<String>,
    pub emoji: Option<String>,
    pub category_type: CategoryType,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregated interaction keyed by dimension natural keys
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionFact {
    pub user_email: String,
    pub content: ContentKey,
    pub google_maps_id: String,
    pub source_property_id: String,
    pub interaction_count: i64,
    pub first_interaction_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

impl InteractionFact {
    pub fn key_label(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.user_email, self.content, self.google_maps_id, self.source_property_id
        )
    }
}

/// Interaction with dimension keys resolved to warehouse surrogate ids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedInteraction {
    pub user_id: i64,
    pub content_id: i64,
    pub place_id: i64,
    pub property_id: i64,
    pub interaction_count: i64,
    pub first_interaction_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_sql_names() {
        for source in AcquisitionSource::ALL {
            assert_eq!(AcquisitionSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(Platform::parse(" YouTube "), Some(Platform::Youtube));
        assert_eq!(Platform::parse("twitter"), None);
        assert_eq!(CategoryType::parse("Award"), Some(CategoryType::Award));
        assert_eq!(CategoryType::parse("category"), None);
    }

    #[test]
    fn content_key_display() {
        let key = ContentKey {
            platform: Platform::Tiktok,
            platform_id: "7301".into(),
        };
        assert_eq!(key.to_string(), "tiktok:7301");
    }
}
