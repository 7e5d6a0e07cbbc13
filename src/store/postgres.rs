//! PostgreSQL warehouse
//!
//! Every statement runs in autocommit, so a constraint violation only
//! discards its own row.

use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, NoTls};

use super::schema::POSTGRES_SCHEMA;
use super::{dimension_upsert_sql, id_lookup_sql, interaction_upsert_sql, Dialect, Warehouse};
use crate::catalog::OlapTable;
use crate::config::PgParams;
use crate::error::{ConstraintKind, EtlError, Result};
use crate::model::{ContentDim, PlaceDim, PropertyDim, ResolvedInteraction, UserDim};

pub struct PostgresWarehouse {
    client: Client,
    label: String,
}

fn constraint_kind(code: &SqlState) -> Option<ConstraintKind> {
    if *code == SqlState::NOT_NULL_VIOLATION {
        Some(ConstraintKind::NotNull)
    } else if *code == SqlState::CHECK_VIOLATION {
        Some(ConstraintKind::Check)
    } else if *code == SqlState::FOREIGN_KEY_VIOLATION {
        Some(ConstraintKind::ForeignKey)
    } else if *code == SqlState::UNIQUE_VIOLATION {
        Some(ConstraintKind::Unique)
    } else {
        None
    }
}

impl PostgresWarehouse {
    pub fn connect(params: &PgParams) -> Result<Self> {
        let label = format!("{}:{}/{}", params.host, params.port, params.database);
        let client = params
            .to_pg_config()
            .connect(NoTls)
            .map_err(|e| EtlError::connection(&label, e))?;
        tracing::debug!(warehouse = %label, "connected to postgres warehouse");
        Ok(Self { client, label })
    }

    fn classify(&self, table: OlapTable, err: postgres::Error) -> EtlError {
        if err.is_closed() {
            return EtlError::connection(&self.label, err);
        }
        if let Some(db) = err.as_db_error() {
            // class 08: connection exception
            if db.code().code().starts_with("08") {
                return EtlError::connection(&self.label, err);
            }
            if let Some(kind) = constraint_kind(db.code()) {
                let detail = match db.constraint() {
                    Some(name) => format!("{} ({name})", db.message()),
                    None => db.message().to_string(),
                };
                return EtlError::Constraint {
                    table: table.as_str().to_string(),
                    kind,
                    detail,
                };
            }
        }
        EtlError::query(format!("{}.{}", self.label, table), err)
    }

    fn upsert_dimension(
        &mut self,
        table: OlapTable,
        values: &[&(dyn ToSql + Sync)],
        key: &[&(dyn ToSql + Sync)],
    ) -> Result<i64> {
        let sql = dimension_upsert_sql(Dialect::Postgres, table);
        let returned = self.client.query_opt(sql.as_str(), values);
        if let Some(row) = returned.map_err(|e| self.classify(table, e))? {
            return Ok(row.get(0));
        }

        let sql = id_lookup_sql(Dialect::Postgres, table);
        let row = self.client.query_one(sql.as_str(), key);
        Ok(row.map_err(|e| self.classify(table, e))?.get(0))
    }
}

impl Warehouse for PostgresWarehouse {
    fn id(&self) -> &str {
        "postgres"
    }

    fn ensure_schema(&mut self) -> Result<()> {
        let result = self.client.batch_execute(POSTGRES_SCHEMA);
        result.map_err(|e| EtlError::query(&self.label, e))
    }

    fn upsert_user(&mut self, row: &UserDim) -> Result<i64> {
        let source = row.found_us_source.map(|s| s.as_str());
        self.upsert_dimension(
            OlapTable::Users,
            &[
                &row.source_user_id,
                &row.email,
                &row.display_name,
                &row.avatar_url,
                &source,
                &row.created_at,
                &row.updated_at,
            ],
            &[&row.email],
        )
    }

    fn upsert_content(&mut self, row: &ContentDim) -> Result<i64> {
        let platform = row.key.platform.as_str();
        self.upsert_dimension(
            OlapTable::Content,
            &[
                &row.source_content_id,
                &platform,
                &row.key.platform_id,
                &row.url,
                &row.thumbnail_url,
                &row.description,
                &row.like_count,
                &row.comment_count,
                &row.uploaded_at,
                &row.created_at,
                &row.updated_at,
            ],
            &[&platform, &row.key.platform_id],
        )
    }

    fn upsert_place(&mut self, row: &PlaceDim) -> Result<i64> {
        self.upsert_dimension(
            OlapTable::Places,
            &[
                &row.source_place_id,
                &row.google_maps_id,
                &row.english_display_name,
                &row.zhtw_display_name,
                &row.english_address,
                &row.zhtw_address,
                &row.phone_number,
                &row.rating,
                &row.latitude,
                &row.longitude,
                &row.country_code,
                &row.english_administrative_area,
                &row.zhtw_administrative_area,
                &row.english_locality,
                &row.zhtw_locality,
                &row.primary_type,
                &row.created_at,
                &row.updated_at,
            ],
            &[&row.google_maps_id],
        )
    }

    fn upsert_property(&mut self, row: &PropertyDim) -> Result<i64> {
        let category = row.category_type.as_str();
        self.upsert_dimension(
            OlapTable::Property,
            &[
                &row.source_property_id,
                &row.english_name,
                &row.zhtw_name,
                &row.emoji,
                &category,
                &row.created_at,
                &row.updated_at,
            ],
            &[&row.source_property_id],
        )
    }

    fn upsert_interaction(&mut self, row: &ResolvedInteraction) -> Result<()> {
        let sql = interaction_upsert_sql(Dialect::Postgres);
        let result = self.client.execute(
            sql.as_str(),
            &[
                &row.user_id,
                &row.content_id,
                &row.place_id,
                &row.property_id,
                &row.interaction_count,
                &row.first_interaction_at,
                &row.last_interaction_at,
            ],
        );
        result.map_err(|e| self.classify(OlapTable::Interactions, e))?;
        Ok(())
    }

    fn count_rows(&mut self, table: OlapTable) -> Result<i64> {
        let result = self
            .client
            .query_one(format!("SELECT COUNT(*) FROM {table}").as_str(), &[]);
        Ok(result.map_err(|e| self.classify(table, e))?.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_database_url, Endpoint};
    use crate::model::{CategoryType, ContentKey, Platform};
    use chrono::{TimeZone, Utc};

    fn connect() -> PostgresWarehouse {
        let url = std::env::var("TEST_POSTGRES_URL").unwrap();
        let Endpoint::Postgres(params) = parse_database_url(&url).unwrap() else {
            panic!("TEST_POSTGRES_URL must be a postgres url");
        };
        let mut wh = PostgresWarehouse::connect(&params).unwrap();
        wh.client
            .batch_execute(
                "DROP TABLE IF EXISTS interactions, property, places, content, users CASCADE",
            )
            .unwrap();
        wh.ensure_schema().unwrap();
        wh
    }

    fn place(gmid: &str, rating: f64) -> PlaceDim {
        PlaceDim {
            source_place_id: gmid.into(),
            google_maps_id: gmid.into(),
            english_display_name: None,
            zhtw_display_name: None,
            english_address: None,
            zhtw_address: None,
            phone_number: None,
            rating: Some(rating),
            latitude: None,
            longitude: None,
            country_code: None,
            english_administrative_area: None,
            zhtw_administrative_area: None,
            english_locality: None,
            zhtw_locality: None,
            primary_type: None,
            created_at: None,
            updated_at: Some(Utc::now()),
        }
    }

    #[test]
    #[ignore = "requires TEST_POSTGRES_URL"]
    fn rating_check_is_classified() {
        let mut wh = connect();
        wh.upsert_place(&place("gm-ok", 5.0)).unwrap();
        let err = wh.upsert_place(&place("gm-bad", 5.1)).unwrap_err();
        assert!(matches!(
            err,
            EtlError::Constraint {
                kind: ConstraintKind::Check,
                ..
            }
        ));
        // the failed statement must not poison the session
        wh.upsert_place(&place("gm-ok-2", 0.0)).unwrap();
        assert_eq!(wh.count_rows(OlapTable::Places).unwrap(), 2);
    }

    #[test]
    #[ignore = "requires TEST_POSTGRES_URL"]
    fn repeated_fact_doubles_count() {
        let mut wh = connect();
        let at = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let user_id = wh
            .upsert_user(&UserDim {
                source_user_id: "u1".into(),
                email: "a@example.com".into(),
                display_name: None,
                avatar_url: None,
                found_us_source: None,
                created_at: None,
                updated_at: Some(at(1)),
            })
            .unwrap();
        let content_id = wh
            .upsert_content(&ContentDim {
                source_content_id: "c1".into(),
                key: ContentKey {
                    platform: Platform::Tiktok,
                    platform_id: "42".into(),
                },
                url: "https://www.tiktok.com/@a/video/42".into(),
                thumbnail_url: None,
                description: None,
                like_count: None,
                comment_count: None,
                uploaded_at: None,
                created_at: None,
                updated_at: Some(at(1)),
            })
            .unwrap();
        let place_id = wh.upsert_place(&place("gm-1", 4.0)).unwrap();
        let property_id = wh
            .upsert_property(&PropertyDim {
                source_property_id: "pr1".into(),
                english_name: None,
                zhtw_name: None,
                emoji: None,
                category_type: CategoryType::Label,
                created_at: None,
                updated_at: Some(at(1)),
            })
            .unwrap();

        let fact = ResolvedInteraction {
            user_id,
            content_id,
            place_id,
            property_id,
            interaction_count: 3,
            first_interaction_at: at(2),
            last_interaction_at: at(3),
        };
        wh.upsert_interaction(&fact).unwrap();
        wh.upsert_interaction(&fact).unwrap();

        let count: i64 = wh
            .client
            .query_one("SELECT interaction_count FROM interactions", &[])
            .unwrap()
            .get(0);
        assert_eq!(count, 6);
    }
}
