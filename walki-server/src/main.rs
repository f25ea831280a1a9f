use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use walki_core::platforms::telegram::client::DEFAULT_API_URL;

mod context;
mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "walki")]
#[command(author, version, about = "Walki - walking tour bot for Telegram")]
pub struct Args {
    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://walki@localhost:5432/walki")]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "10")]
    pub db_max_connections: u32,

    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value = "5")]
    pub db_acquire_timeout_secs: u64,

    /// Bot API token issued by @BotFather.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_API_URL)]
    pub telegram_api_url: String,

    /// S3-compatible endpoint holding route media.
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: String,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub s3_access_key: String,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub s3_secret_key: String,

    /// Use `bucket.host/key` addressing instead of `host/bucket/key`.
    #[arg(long, env = "S3_VIRTUAL_HOSTED", default_value = "false")]
    pub s3_virtual_hosted: bool,

    /// Lifetime of the presigned media URLs handed to Telegram.
    #[arg(long, env = "MEDIA_URL_TTL_SECS", default_value = "300")]
    pub media_url_ttl_secs: u64,

    /// Deadline for handling one update.
    #[arg(long, env = "HANDLER_TIMEOUT_SECS", default_value = "30")]
    pub handler_timeout_secs: u64,

    /// Long-poll timeout for getUpdates.
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value = "30")]
    pub poll_timeout_secs: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("walki=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("Walki starting. api={}, bucket={}", args.telegram_api_url, args.s3_bucket);

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(Box::new(e) as Box<dyn std::error::Error>);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
