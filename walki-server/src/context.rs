//! walki-server/src/context.rs
//!
//! Everything the update loop needs, built once at startup.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use walki_common::traits::repository_traits::UserRepository;
use walki_core::{Database, DbConfig};
use walki_core::Error;
use walki_core::cache::ReferenceCache;
use walki_core::platforms::telegram::TelegramClient;
use walki_core::platforms::ChatPlatform;
use walki_core::repositories::{
    PostgresMediaRepository, PostgresOrderRepository, PostgresRouteRepository,
    PostgresRouteRunRepository, PostgresUserRepository,
};
use walki_core::services::{MediaService, RouteCardService, RouteRunService, RouteSessionService};
use walki_core::storage::{S3BlobStore, S3Config};

use crate::Args;

pub struct ServerContext {
    pub db: Database,
    pub telegram: Arc<TelegramClient>,
    pub users: Arc<dyn UserRepository>,
    pub session: Arc<RouteSessionService>,
    pub references: Arc<ReferenceCache>,
    pub handler_timeout: Duration,
    pub poll_timeout_secs: u64,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        // 1) DB + schema
        let db = Database::connect(&DbConfig {
            url: args.database_url.clone(),
            max_connections: args.db_max_connections,
            acquire_timeout: Duration::from_secs(args.db_acquire_timeout_secs),
        })
        .await?;
        db.migrate().await?;

        // 2) Repositories
        let route_repo = Arc::new(PostgresRouteRepository::new(db.pool().clone()));
        let order_repo = Arc::new(PostgresOrderRepository::new(db.pool().clone()));
        let run_repo = Arc::new(PostgresRouteRunRepository::new(db.pool().clone()));
        let media_repo = Arc::new(PostgresMediaRepository::new(db.pool().clone()));
        let users: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(db.pool().clone()));

        // 3) Outbound collaborators
        let telegram = Arc::new(TelegramClient::new(&args.telegram_api_url, &args.bot_token));
        let platform: Arc<dyn ChatPlatform> = telegram.clone();
        let blob_store = Arc::new(S3BlobStore::new(S3Config {
            endpoint: args.s3_endpoint.clone(),
            bucket: args.s3_bucket.clone(),
            region: args.s3_region.clone(),
            access_key: args.s3_access_key.clone(),
            secret_key: args.s3_secret_key.clone(),
            virtual_hosted: args.s3_virtual_hosted,
        })?);

        // 4) Services
        let references = Arc::new(ReferenceCache::new(media_repo.clone()));
        let media_service = Arc::new(
            MediaService::new(media_repo, references.clone(), blob_store, platform.clone())
                .with_url_ttl(Duration::from_secs(args.media_url_ttl_secs)),
        );
        let run = Arc::new(RouteRunService::new(
            route_repo,
            order_repo,
            run_repo.clone(),
            run_repo,
        ));
        let cards = Arc::new(RouteCardService::new(platform.clone(), media_service, run.clone()));
        let session = Arc::new(RouteSessionService::new(run, cards, platform));

        info!(
            "Server context ready (media url ttl {}s, handler timeout {}s)",
            args.media_url_ttl_secs, args.handler_timeout_secs
        );

        Ok(Self {
            db,
            telegram,
            users,
            session,
            references,
            handler_timeout: Duration::from_secs(args.handler_timeout_secs),
            poll_timeout_secs: args.poll_timeout_secs,
        })
    }
}
