// File: walki-core/src/repositories/postgres/user.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use walki_common::traits::repository_traits::UserRepository;
use crate::Error;

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn upsert_by_telegram_id(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<i32, Error> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO users (telegram_id, username, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (telegram_id) DO UPDATE
            SET username   = COALESCE(EXCLUDED.username, users.username),
                full_name  = COALESCE(EXCLUDED.full_name, users.full_name),
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
