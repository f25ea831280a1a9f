// File: walki-core/src/repositories/postgres/order.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use walki_common::traits::repository_traits::AccessRepository;
use crate::Error;

/// Entitlement checks over the `orders` table.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: Pool<Postgres>,
}

impl PostgresOrderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessRepository for PostgresOrderRepository {
    async fn user_has_access(&self, user_id: i32, route_id: i32) -> Result<bool, Error> {
        let ok: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM orders
                WHERE user_id = $1 AND route_id = $2 AND status = 'paid'
                  AND (access_expiry IS NULL OR access_expiry >= NOW())
            )
            "#,
        )
        .bind(user_id)
        .bind(route_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ok)
    }
}
