// File: walki-core/src/repositories/postgres/route.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;

use walki_common::models::RouteVersion;
use walki_common::traits::repository_traits::RouteRepository;
use crate::Error;

#[derive(Clone)]
pub struct PostgresRouteRepository {
    pool: Pool<Postgres>,
}

impl PostgresRouteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn version_from_row(row: &PgRow) -> RouteVersion {
    RouteVersion {
        id: row.get("id"),
        route_id: row.get("route_id"),
        version_number: row.get("version_number"),
        title: row.get("title"),
        description: row.get("description"),
        duration_minutes: row.get("duration_minutes"),
        length_km: row.get("length_km"),
        price: row.get("price"),
        city: row.get("city"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl RouteRepository for PostgresRouteRepository {
    async fn latest_version(&self, route_id: i32) -> Result<Option<RouteVersion>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, route_id, version_number, title, description,
                   COALESCE(duration_minutes, 0) AS duration_minutes,
                   COALESCE(length_km, 0) AS length_km,
                   COALESCE(price, 0) AS price,
                   city, created_at
            FROM route_versions
            WHERE route_id = $1
            ORDER BY version_number DESC
            LIMIT 1
            "#,
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row_opt.as_ref().map(version_from_row))
    }

    async fn version_by_id(&self, version_id: i32) -> Result<Option<RouteVersion>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, route_id, version_number, title, description,
                   COALESCE(duration_minutes, 0) AS duration_minutes,
                   COALESCE(length_km, 0) AS length_km,
                   COALESCE(price, 0) AS price,
                   city, created_at
            FROM route_versions
            WHERE id = $1
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row_opt.as_ref().map(version_from_row))
    }
}
