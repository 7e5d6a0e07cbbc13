//! Star schema DDL, PostgreSQL and SQLite dialects
//!
//! Both dialects carry the same columns, uniqueness, checks and foreign
//! keys. SQLite approximates the email pattern with LIKE and stores
//! timestamps as RFC 3339 text.

pub const POSTGRES_SCHEMA: &str = r#"
-- ============================================
-- DIMENSIONS
-- ============================================

CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    source_user_id TEXT,
    email TEXT NOT NULL UNIQUE
        CHECK (email ~ '^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$'),
    display_name TEXT,
    avatar_url TEXT,
    found_us_source TEXT CHECK (found_us_source IN (
        'instagram', 'tiktok', 'youtube', 'threads', 'friends',
        'web_summit', 'app_store', 'organic', 'other')),
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS content (
    id BIGSERIAL PRIMARY KEY,
    source_content_id TEXT,
    platform TEXT NOT NULL CHECK (platform IN ('instagram', 'tiktok', 'youtube')),
    platform_id TEXT NOT NULL,
    url TEXT NOT NULL,
    thumbnail_url TEXT,
    description TEXT,
    like_count BIGINT CHECK (like_count >= 0),
    comment_count BIGINT CHECK (comment_count >= 0),
    uploaded_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ,
    UNIQUE (platform, platform_id)
);

CREATE TABLE IF NOT EXISTS places (
    id BIGSERIAL PRIMARY KEY,
    source_place_id TEXT,
    google_maps_id TEXT NOT NULL UNIQUE,
    english_display_name TEXT,
    zhtw_display_name TEXT,
    english_address TEXT,
    zhtw_address TEXT,
    phone_number TEXT,
    rating DOUBLE PRECISION CHECK (rating >= 0 AND rating <= 5),
    latitude DOUBLE PRECISION CHECK (latitude >= -90 AND latitude <= 90),
    longitude DOUBLE PRECISION CHECK (longitude >= -180 AND longitude <= 180),
    country_code TEXT,
    english_administrative_area TEXT,
    zhtw_administrative_area TEXT,
    english_locality TEXT,
    zhtw_locality TEXT,
    primary_type TEXT,
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS property (
    id BIGSERIAL PRIMARY KEY,
    source_property_id TEXT NOT NULL UNIQUE,
    english_name TEXT,
    zhtw_name TEXT,
    emoji TEXT CHECK (char_length(emoji) BETWEEN 1 AND 8),
    category_type TEXT NOT NULL
        CHECK (category_type IN ('label', 'ranking', 'award', 'campaign')),
    created_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ
);

-- ============================================
-- FACT
-- ============================================

CREATE TABLE IF NOT EXISTS interactions (
    user_id BIGINT NOT NULL REFERENCES users(id),
    content_id BIGINT NOT NULL REFERENCES content(id),
    place_id BIGINT NOT NULL REFERENCES places(id),
    property_id BIGINT NOT NULL REFERENCES property(id),
    interaction_count BIGINT NOT NULL DEFAULT 1 CHECK (interaction_count > 0),
    first_interaction_at TIMESTAMPTZ NOT NULL,
    last_interaction_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (user_id, content_id, place_id, property_id)
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_users_source_id ON users(source_user_id);
CREATE INDEX IF NOT EXISTS idx_content_source_id ON content(source_content_id);
CREATE INDEX IF NOT EXISTS idx_places_source_id ON places(source_place_id);
CREATE INDEX IF NOT EXISTS idx_interactions_content ON interactions(content_id);
CREATE INDEX IF NOT EXISTS idx_interactions_place ON interactions(place_id);
CREATE INDEX IF NOT EXISTS idx_interactions_property ON interactions(property_id);
"#;

pub const SQLITE_SCHEMA: &str = r#"
-- ============================================
-- DIMENSIONS
-- ============================================

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_user_id TEXT,
    email TEXT NOT NULL UNIQUE CHECK (email LIKE '%_@_%._%'),
    display_name TEXT,
    avatar_url TEXT,
    found_us_source TEXT CHECK (found_us_source IN (
        'instagram', 'tiktok', 'youtube', 'threads', 'friends',
        'web_summit', 'app_store', 'organic', 'other')),
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_content_id TEXT,
    platform TEXT NOT NULL CHECK (platform IN ('instagram', 'tiktok', 'youtube')),
    platform_id TEXT NOT NULL,
    url TEXT NOT NULL,
    thumbnail_url TEXT,
    description TEXT,
    like_count INTEGER CHECK (like_count >= 0),
    comment_count INTEGER CHECK (comment_count >= 0),
    uploaded_at TEXT,
    created_at TEXT,
    updated_at TEXT,
    UNIQUE (platform, platform_id)
);

CREATE TABLE IF NOT EXISTS places (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_place_id TEXT,
    google_maps_id TEXT NOT NULL UNIQUE,
    english_display_name TEXT,
    zhtw_display_name TEXT,
    english_address TEXT,
    zhtw_address TEXT,
    phone_number TEXT,
    rating REAL CHECK (rating >= 0 AND rating <= 5),
    latitude REAL CHECK (latitude >= -90 AND latitude <= 90),
    longitude REAL CHECK (longitude >= -180 AND longitude <= 180),
    country_code TEXT,
    english_administrative_area TEXT,
    zhtw_administrative_area TEXT,
    english_locality TEXT,
    zhtw_locality TEXT,
    primary_type TEXT,
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS property (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_property_id TEXT NOT NULL UNIQUE,
    english_name TEXT,
    zhtw_name TEXT,
    emoji TEXT CHECK (length(emoji) BETWEEN 1 AND 8),
    category_type TEXT NOT NULL
        CHECK (category_type IN ('label', 'ranking', 'award', 'campaign')),
    created_at TEXT,
    updated_at TEXT
);

-- ============================================
-- FACT
-- ============================================

CREATE TABLE IF NOT EXISTS interactions (
    user_id INTEGER NOT NULL REFERENCES users(id),
    content_id INTEGER NOT NULL REFERENCES content(id),
    place_id INTEGER NOT NULL REFERENCES places(id),
    property_id INTEGER NOT NULL REFERENCES property(id),
    interaction_count INTEGER NOT NULL DEFAULT 1 CHECK (interaction_count > 0),
    first_interaction_at TEXT NOT NULL,
    last_interaction_at TEXT NOT NULL,
    PRIMARY KEY (user_id, content_id, place_id, property_id)
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_users_source_id ON users(source_user_id);
CREATE INDEX IF NOT EXISTS idx_content_source_id ON content(source_content_id);
CREATE INDEX IF NOT EXISTS idx_places_source_id ON places(source_place_id);
CREATE INDEX IF NOT EXISTS idx_interactions_content ON interactions(content_id);
CREATE INDEX IF NOT EXISTS idx_interactions_place ON interactions(place_id);
CREATE INDEX IF NOT EXISTS idx_interactions_property ON interactions(property_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OlapTable;
    use crate::transform::validate::EMAIL_PATTERN;

    /// Column names declared by `CREATE TABLE <table>` in `ddl`
    fn declared_columns(ddl: &str, table: &str) -> Vec<String> {
        let header = format!("CREATE TABLE IF NOT EXISTS {table} (");
        let start = ddl
            .find(&header)
            .unwrap_or_else(|| panic!("no table {table}"))
            + header.len();
        let body = &ddl[start..];
        let end = body.find("\n);").unwrap();

        body[..end]
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| line.starts_with(|c: char| c.is_ascii_lowercase()))
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    fn expected_columns(table: OlapTable) -> Vec<String> {
        let mut columns = vec![];
        if table.has_surrogate_id() {
            columns.push("id".to_string());
        }
        columns.extend(table.columns().iter().map(|c| c.to_string()));
        columns
    }

    #[test]
    fn ddl_matches_column_catalog() {
        for ddl in [POSTGRES_SCHEMA, SQLITE_SCHEMA] {
            for table in OlapTable::LOAD_ORDER {
                assert_eq!(
                    declared_columns(ddl, table.as_str()),
                    expected_columns(table),
                    "{table}"
                );
            }
        }
    }

    #[test]
    fn postgres_email_check_matches_validator() {
        assert!(POSTGRES_SCHEMA.contains(EMAIL_PATTERN));
    }

    #[test]
    fn sqlite_schema_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SQLITE_SCHEMA).unwrap();
        conn.execute_batch(SQLITE_SCHEMA).unwrap();
    }
}
