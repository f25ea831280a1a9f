// File: walki-core/src/repositories/postgres/route_run.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use sqlx::postgres::PgRow;
use tracing::debug;

use walki_common::models::{MessageIdUpdate, PointMedia, RoutePoint, RouteProgress};
use walki_common::traits::repository_traits::{PointRepository, ProgressRepository};
use crate::Error;

/// Waypoints and per-user progress. Both live in the same schema area and are
/// always used together by the route run service.
#[derive(Clone)]
pub struct PostgresRouteRunRepository {
    pool: Pool<Postgres>,
}

impl PostgresRouteRunRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn point_from_row(row: &PgRow) -> RoutePoint {
    RoutePoint {
        id: row.get("id"),
        version_id: row.get("version_id"),
        idx: row.get("order_index"),
        title: row.get("title"),
        description: row.get("description"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl PointRepository for PostgresRouteRunRepository {
    async fn point_at_index(&self, version_id: i32, idx: i32) -> Result<Option<RoutePoint>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, version_id, order_index, title, description, latitude, longitude, created_at
            FROM route_points
            WHERE version_id = $1 AND order_index = $2
            "#,
        )
        .bind(version_id)
        .bind(idx)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row_opt.as_ref().map(point_from_row))
    }

    async fn first_point(&self, version_id: i32) -> Result<Option<RoutePoint>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, version_id, order_index, title, description, latitude, longitude, created_at
            FROM route_points
            WHERE version_id = $1
            ORDER BY order_index ASC
            LIMIT 1
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row_opt.as_ref().map(point_from_row))
    }

    async fn next_index(&self, version_id: i32, after: i32) -> Result<Option<i32>, Error> {
        let idx: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT order_index FROM route_points
            WHERE version_id = $1 AND order_index > $2
            ORDER BY order_index ASC
            LIMIT 1
            "#,
        )
        .bind(version_id)
        .bind(after)
        .fetch_optional(&self.pool)
        .await?;

        Ok(idx)
    }

    async fn prev_index(&self, version_id: i32, before: i32) -> Result<Option<i32>, Error> {
        let idx: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT order_index FROM route_points
            WHERE version_id = $1 AND order_index < $2
            ORDER BY order_index DESC
            LIMIT 1
            "#,
        )
        .bind(version_id)
        .bind(before)
        .fetch_optional(&self.pool)
        .await?;

        Ok(idx)
    }

    async fn media_for_point(&self, point_id: i32) -> Result<PointMedia, Error> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.type
            FROM route_point_media rpm
            JOIN media m ON m.id = rpm.media_id
            WHERE rpm.route_point_id = $1
            ORDER BY rpm.position, m.id
            "#,
        )
        .bind(point_id)
        .fetch_all(&self.pool)
        .await?;

        let mut media = PointMedia::default();
        for row in rows {
            let id: i64 = row.get("id");
            let kind: String = row.get("type");
            match kind.as_str() {
                "image" => media.photo_ids.push(id),
                "audio" => media.audio_ids.push(id),
                other => debug!("Ignoring media {} of type '{}' on point {}", id, other, point_id),
            }
        }
        Ok(media)
    }
}

#[async_trait]
impl ProgressRepository for PostgresRouteRunRepository {
    async fn upsert_progress(
        &self,
        user_id: i32,
        route_id: i32,
        version_id: i32,
        idx: i32,
        reopen: bool,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO route_progress (user_id, route_id, version_id, current_idx)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, version_id) DO UPDATE
              SET current_idx = EXCLUDED.current_idx,
                  route_id    = EXCLUDED.route_id,
                  finished_at = CASE WHEN $5 THEN NULL ELSE route_progress.finished_at END,
                  started_at  = CASE WHEN $5 THEN NOW() ELSE route_progress.started_at END
            "#,
        )
        .bind(user_id)
        .bind(route_id)
        .bind(version_id)
        .bind(idx)
        .bind(reopen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_progress(&self, user_id: i32, version_id: i32) -> Result<Option<RouteProgress>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, user_id, route_id, version_id, current_idx, started_at, finished_at,
                   content_msg_id, voice_msg_id
            FROM route_progress
            WHERE user_id = $1 AND version_id = $2
            "#,
        )
        .bind(user_id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row_opt {
            Ok(Some(RouteProgress {
                id: row.get("id"),
                user_id: row.get("user_id"),
                route_id: row.get("route_id"),
                version_id: row.get("version_id"),
                current_idx: row.get("current_idx"),
                started_at: row.get("started_at"),
                finished_at: row.get("finished_at"),
                content_message_id: row.get("content_msg_id"),
                voice_message_id: row.get("voice_msg_id"),
            }))
        } else {
            Ok(None)
        }
    }

    async fn finish(&self, user_id: i32, version_id: i32) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE route_progress
            SET finished_at = COALESCE(finished_at, NOW())
            WHERE user_id = $1 AND version_id = $2
            "#,
        )
        .bind(user_id)
        .bind(version_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ProgressNotFound { user_id, version_id });
        }
        Ok(())
    }

    async fn update_message_ids(
        &self,
        user_id: i32,
        version_id: i32,
        content: MessageIdUpdate,
        voice: MessageIdUpdate,
    ) -> Result<(), Error> {
        // Untouched fields are written back as themselves.
        let result = sqlx::query(
            r#"
            UPDATE route_progress
            SET content_msg_id = CASE WHEN $1 THEN $2 ELSE content_msg_id END,
                voice_msg_id   = CASE WHEN $3 THEN $4 ELSE voice_msg_id END
            WHERE user_id = $5 AND version_id = $6
            "#,
        )
        .bind(!content.is_unset())
        .bind(content.value())
        .bind(!voice.is_unset())
        .bind(voice.value())
        .bind(user_id)
        .bind(version_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ProgressNotFound { user_id, version_id });
        }
        Ok(())
    }
}
