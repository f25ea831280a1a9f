// File: walki-core/src/repositories/postgres/media.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use walki_common::models::{Media, PlatformReference};
use walki_common::traits::repository_traits::{MediaRepository, PlatformReferenceRepository};
use crate::Error;

/// Media metadata plus the persisted tier of platform file references.
#[derive(Clone)]
pub struct PostgresMediaRepository {
    pool: Pool<Postgres>,
}

impl PostgresMediaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PostgresMediaRepository {
    async fn get_by_id(&self, media_id: i64) -> Result<Option<Media>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, type, filename, size_bytes, mime_type, s3_bucket, s3_key, uploaded_at
            FROM media
            WHERE id = $1
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row_opt {
            Ok(Some(Media {
                id: row.get("id"),
                media_type: row.get("type"),
                filename: row.get("filename"),
                size_bytes: row.get("size_bytes"),
                mime_type: row.get("mime_type"),
                storage_bucket: row.get("s3_bucket"),
                storage_key: row.get("s3_key"),
                uploaded_at: row.get("uploaded_at"),
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl PlatformReferenceRepository for PostgresMediaRepository {
    async fn get_reference(&self, media_id: i64) -> Result<Option<PlatformReference>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT media_id, file_id, content_type, chat_id, created_at
            FROM telegram_files
            WHERE media_id = $1
            "#,
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row_opt.map(|row| PlatformReference {
            media_id: row.get("media_id"),
            native_ref: row.get("file_id"),
            content_type: row.get("content_type"),
            chat_id: row.get("chat_id"),
            created_at: row.get("created_at"),
        }))
    }

    async fn upsert_reference(
        &self,
        media_id: i64,
        native_ref: &str,
        content_type: &str,
        chat_id: Option<i64>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO telegram_files (media_id, file_id, content_type, chat_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (media_id) DO UPDATE
            SET file_id      = EXCLUDED.file_id,
                content_type = EXCLUDED.content_type,
                chat_id      = EXCLUDED.chat_id,
                created_at   = NOW()
            "#,
        )
        .bind(media_id)
        .bind(native_ref)
        .bind(content_type)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
