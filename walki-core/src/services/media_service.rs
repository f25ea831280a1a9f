// File: src/services/media_service.rs

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use walki_common::models::{InlineKeyboard, MediaKind, MediaSource, SentMedia, TextFormat};
use walki_common::traits::platform_traits::ChatPlatform;
use walki_common::traits::repository_traits::MediaRepository;
use walki_common::traits::storage_traits::BlobStore;
use crate::cache::ReferenceCache;
use crate::Error;

/// Default lifetime of the presigned URL handed to the platform.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(5 * 60);

/// Delivers stored media to a chat, reusing platform references where we have
/// them and falling back to a presigned blob URL otherwise.
pub struct MediaService {
    media_repo: Arc<dyn MediaRepository>,
    references: Arc<ReferenceCache>,
    blob_store: Arc<dyn BlobStore>,
    platform: Arc<dyn ChatPlatform>,
    url_ttl: Duration,
}

impl MediaService {
    pub fn new(
        media_repo: Arc<dyn MediaRepository>,
        references: Arc<ReferenceCache>,
        blob_store: Arc<dyn BlobStore>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            media_repo,
            references,
            blob_store,
            platform,
            url_ttl: DEFAULT_URL_TTL,
        }
    }

    pub fn with_url_ttl(mut self, url_ttl: Duration) -> Self {
        self.url_ttl = url_ttl;
        self
    }

    /// Sends media `media_id` to `chat_id` and returns the platform reference
    /// plus the id of the new message. A delivered message without a reference
    /// is still a success; nothing is cached for it. Errors are returned as
    /// they come; there is no retry here.
    pub async fn send_media(
        &self,
        chat_id: i64,
        media_id: i64,
        caption: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<SentMedia, Error> {
        let media = self
            .media_repo
            .get_by_id(media_id)
            .await?
            .ok_or(Error::MediaUnresolvable(media_id))?;
        let storage_key = media
            .storage_key()
            .ok_or(Error::MediaUnresolvable(media_id))?
            .to_string();
        let mime = media.mime().to_string();

        // A reference is only valid for the send operation that produced it,
        // so both paths go through the same narrowed kind.
        let kind = MediaKind::classify(&mime).for_delivery(&mime);

        if let Some(cached) = self.references.get(media_id).await {
            debug!("Sending media {} as {} from cached reference", media_id, kind.as_str());
            let source = MediaSource::NativeRef(cached.native_ref.clone());
            let sent = self
                .platform
                .send_media(chat_id, kind, &source, caption, format, controls)
                .await?;
            return Ok(SentMedia {
                message_id: sent.message_id,
                native_ref: Some(cached.native_ref),
            });
        }

        let url = self.blob_store.presign_download(&storage_key, self.url_ttl).await?;
        debug!("Sending media {} as {} from presigned URL", media_id, kind.as_str());
        let sent = self
            .platform
            .send_media(chat_id, kind, &MediaSource::Url(url), caption, format, controls)
            .await?;

        match sent.native_ref.as_deref() {
            Some(native_ref) => {
                if let Err(e) = self.references.store(media_id, native_ref, &mime, Some(chat_id)).await {
                    warn!("Could not cache reference for media {}: {:?}", media_id, e);
                }
            }
            None => warn!("Media {} delivered as message {} without a reference", media_id, sent.message_id),
        }

        Ok(sent)
    }
}
