// File: src/cache/reference_cache.rs

use std::sync::Arc;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use walki_common::models::PlatformReference;
use walki_common::traits::repository_traits::PlatformReferenceRepository;
use crate::Error;

/// Two-tier lookup of platform references: an in-process map in front of the
/// persisted store. Entries are only ever replaced, never expired; a stale
/// entry costs at most one failed send.
pub struct ReferenceCache {
    store: Arc<dyn PlatformReferenceRepository>,
    memory: DashMap<i64, PlatformReference>,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn PlatformReferenceRepository>) -> Self {
        Self {
            store,
            memory: DashMap::new(),
        }
    }

    /// Returns the cached reference for `media_id`, if any tier has a usable one.
    /// Store failures are logged and reported as a miss.
    pub async fn get(&self, media_id: i64) -> Option<PlatformReference> {
        if let Some(entry) = self.memory.get(&media_id) {
            return Some(entry.value().clone());
        }

        match self.store.get_reference(media_id).await {
            Ok(Some(reference)) if !reference.native_ref.is_empty() => {
                debug!("Reference for media {} loaded from store", media_id);
                self.memory.insert(media_id, reference.clone());
                Some(reference)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Reference lookup for media {} failed, treating as miss: {:?}", media_id, e);
                None
            }
        }
    }

    /// Writes through to the store, then to memory.
    pub async fn store(
        &self,
        media_id: i64,
        native_ref: &str,
        content_type: &str,
        chat_id: Option<i64>,
    ) -> Result<(), Error> {
        self.store
            .upsert_reference(media_id, native_ref, content_type, chat_id)
            .await?;

        self.memory.insert(
            media_id,
            PlatformReference {
                media_id,
                native_ref: native_ref.to_string(),
                content_type: content_type.to_string(),
                chat_id,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}
