// walki-core/src/db/mod.rs
//
// Postgres pool plus the schema embedded from `migrations/`.

use std::time::Duration;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::Pool;
use tracing::{debug, info};
use crate::Error;

static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Pool sizing. Each chat handler holds at most one connection at a time.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(self.acquire_timeout)
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, Error> {
        let pool = config.pool_options().connect(&config.url).await?;
        info!("Connected to Postgres (pool of {})", config.max_connections.max(1));
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Applies pending migrations; already-applied ones are skipped by sqlx.
    pub async fn migrate(&self) -> Result<(), Error> {
        for m in MIGRATOR.iter() {
            debug!("Known migration {} ({})", m.version, m.description);
        }
        MIGRATOR.run(&self.pool).await?;
        info!("Schema at migration {}", latest_migration().unwrap_or_default());
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

fn latest_migration() -> Option<i64> {
    MIGRATOR.iter().map(|m| m.version).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_options_follow_config() {
        let mut config = DbConfig::new("postgres://localhost/walki");
        config.max_connections = 3;
        config.acquire_timeout = Duration::from_secs(2);
        let options = config.pool_options();
        assert_eq!(options.get_max_connections(), 3);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(2));

        config.max_connections = 0;
        assert_eq!(config.pool_options().get_max_connections(), 1);
    }

    #[test]
    fn schema_migration_is_embedded() {
        assert_eq!(latest_migration(), Some(20250101000000));
    }
}
