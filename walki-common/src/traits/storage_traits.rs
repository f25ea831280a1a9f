use std::time::Duration;
use async_trait::async_trait;
use crate::error::Error;

/// Blob storage that can hand out short-lived download links.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn presign_download(&self, storage_key: &str, ttl: Duration) -> Result<String, Error>;
}
