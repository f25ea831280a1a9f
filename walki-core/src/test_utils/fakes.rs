// File: walki-core/src/test_utils/fakes.rs
//
// In-memory stand-ins for the Postgres repositories, the chat platform and the
// blob store. They follow the same contracts as the real implementations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use walki_common::models::{
    InlineKeyboard, Media, MediaKind, MediaSource, MessageIdUpdate, PlatformReference, PointMedia,
    RoutePoint, RouteProgress, RouteVersion, SentMedia, TextFormat,
};
use walki_common::traits::platform_traits::ChatPlatform;
use walki_common::traits::repository_traits::{
    AccessRepository, MediaRepository, PlatformReferenceRepository, PointRepository,
    ProgressRepository, RouteRepository,
};
use walki_common::traits::storage_traits::BlobStore;
use crate::Error;

// ---------------------------------------------------------------------------
// Routes, points, access, progress
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRouteStore {
    versions: Mutex<Vec<RouteVersion>>,
    access: Mutex<HashSet<(i32, i32)>>,
    points: Mutex<Vec<RoutePoint>>,
    media: Mutex<HashMap<i32, PointMedia>>,
    progress: Mutex<HashMap<(i32, i32), RouteProgress>>,
    next_progress_id: AtomicI32,
    fail_probes: AtomicBool,
}

impl InMemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_version(&self, route_id: i32, version_id: i32, version_number: i32) {
        self.versions.lock().push(RouteVersion {
            id: version_id,
            route_id,
            version_number,
            title: format!("Route {route_id} v{version_number}"),
            description: String::new(),
            duration_minutes: 60,
            length_km: 3.5,
            price: 0.0,
            city: "Testville".into(),
            created_at: Utc::now(),
        });
    }

    pub fn grant_access(&self, user_id: i32, route_id: i32) {
        self.access.lock().insert((user_id, route_id));
    }

    pub fn add_point(&self, version_id: i32, point_id: i32, idx: i32, title: &str) {
        self.points.lock().push(RoutePoint {
            id: point_id,
            version_id,
            idx,
            title: title.into(),
            description: format!("About {title}"),
            latitude: 59.9386,
            longitude: 30.3141,
            created_at: Utc::now(),
        });
    }

    pub fn attach_media(&self, point_id: i32, photo_ids: Vec<i64>, audio_ids: Vec<i64>) {
        self.media.lock().insert(point_id, PointMedia { photo_ids, audio_ids });
    }

    /// Makes neighbour lookups (`next_index`/`prev_index`) fail.
    pub fn fail_probes(&self, fail: bool) {
        self.fail_probes.store(fail, Ordering::SeqCst);
    }

    pub fn progress_of(&self, user_id: i32, version_id: i32) -> Option<RouteProgress> {
        self.progress.lock().get(&(user_id, version_id)).cloned()
    }

    pub fn progress_rows(&self) -> usize {
        self.progress.lock().len()
    }

    fn probe_guard(&self) -> Result<(), Error> {
        if self.fail_probes.load(Ordering::SeqCst) {
            Err(Error::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn indices(&self, version_id: i32) -> Vec<i32> {
        let mut idx: Vec<i32> = self
            .points
            .lock()
            .iter()
            .filter(|p| p.version_id == version_id)
            .map(|p| p.idx)
            .collect();
        idx.sort_unstable();
        idx
    }
}

#[async_trait]
impl RouteRepository for InMemoryRouteStore {
    async fn latest_version(&self, route_id: i32) -> Result<Option<RouteVersion>, Error> {
        Ok(self
            .versions
            .lock()
            .iter()
            .filter(|v| v.route_id == route_id)
            .max_by_key(|v| v.version_number)
            .cloned())
    }

    async fn version_by_id(&self, version_id: i32) -> Result<Option<RouteVersion>, Error> {
        Ok(self.versions.lock().iter().find(|v| v.id == version_id).cloned())
    }
}

#[async_trait]
impl AccessRepository for InMemoryRouteStore {
    async fn user_has_access(&self, user_id: i32, route_id: i32) -> Result<bool, Error> {
        Ok(self.access.lock().contains(&(user_id, route_id)))
    }
}

#[async_trait]
impl PointRepository for InMemoryRouteStore {
    async fn point_at_index(&self, version_id: i32, idx: i32) -> Result<Option<RoutePoint>, Error> {
        Ok(self
            .points
            .lock()
            .iter()
            .find(|p| p.version_id == version_id && p.idx == idx)
            .cloned())
    }

    async fn first_point(&self, version_id: i32) -> Result<Option<RoutePoint>, Error> {
        Ok(self
            .points
            .lock()
            .iter()
            .filter(|p| p.version_id == version_id)
            .min_by_key(|p| p.idx)
            .cloned())
    }

    async fn next_index(&self, version_id: i32, after: i32) -> Result<Option<i32>, Error> {
        self.probe_guard()?;
        Ok(self.indices(version_id).into_iter().find(|i| *i > after))
    }

    async fn prev_index(&self, version_id: i32, before: i32) -> Result<Option<i32>, Error> {
        self.probe_guard()?;
        Ok(self.indices(version_id).into_iter().rev().find(|i| *i < before))
    }

    async fn media_for_point(&self, point_id: i32) -> Result<PointMedia, Error> {
        Ok(self.media.lock().get(&point_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRouteStore {
    async fn upsert_progress(
        &self,
        user_id: i32,
        route_id: i32,
        version_id: i32,
        idx: i32,
        reopen: bool,
    ) -> Result<(), Error> {
        let mut progress = self.progress.lock();
        match progress.get_mut(&(user_id, version_id)) {
            Some(row) => {
                row.current_idx = idx;
                if reopen {
                    row.finished_at = None;
                    row.started_at = Utc::now();
                }
            }
            None => {
                let id = self.next_progress_id.fetch_add(1, Ordering::SeqCst) + 1;
                progress.insert(
                    (user_id, version_id),
                    RouteProgress {
                        id,
                        user_id,
                        route_id,
                        version_id,
                        current_idx: idx,
                        started_at: Utc::now(),
                        finished_at: None,
                        content_message_id: None,
                        voice_message_id: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_progress(&self, user_id: i32, version_id: i32) -> Result<Option<RouteProgress>, Error> {
        Ok(self.progress_of(user_id, version_id))
    }

    async fn finish(&self, user_id: i32, version_id: i32) -> Result<(), Error> {
        let mut progress = self.progress.lock();
        let row = progress
            .get_mut(&(user_id, version_id))
            .ok_or(Error::ProgressNotFound { user_id, version_id })?;
        if row.finished_at.is_none() {
            row.finished_at = Some(Utc::now());
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
        let mut progress = self.progress.lock();
        let row = progress
            .get_mut(&(user_id, version_id))
            .ok_or(Error::ProgressNotFound { user_id, version_id })?;
        row.content_message_id = content.apply(row.content_message_id);
        row.voice_message_id = voice.apply(row.voice_message_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Media metadata + persisted platform references
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryMediaStore {
    media: Mutex<HashMap<i64, Media>>,
    references: Mutex<HashMap<i64, PlatformReference>>,
    upserts: AtomicUsize,
    reference_reads: AtomicUsize,
    fail_reference_reads: AtomicBool,
    fail_reference_writes: AtomicBool,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_media(&self, id: i64, mime: &str, storage_key: Option<&str>) {
        let media_type = match MediaKind::classify(mime) {
            MediaKind::Photo => "image",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        };
        self.media.lock().insert(
            id,
            Media {
                id,
                media_type: media_type.into(),
                filename: storage_key.map(|k| k.rsplit('/').next().unwrap_or(k).to_string()),
                size_bytes: Some(1024),
                mime_type: Some(mime.into()),
                storage_bucket: Some("walki-media".into()),
                storage_key: storage_key.map(str::to_string),
                uploaded_at: Utc::now(),
            },
        );
    }

    pub fn put_reference(&self, media_id: i64, native_ref: &str) {
        self.references.lock().insert(
            media_id,
            PlatformReference {
                media_id,
                native_ref: native_ref.into(),
                content_type: String::new(),
                chat_id: None,
                created_at: Utc::now(),
            },
        );
    }

    pub fn reference(&self, media_id: i64) -> Option<PlatformReference> {
        self.references.lock().get(&media_id).cloned()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn reference_read_count(&self) -> usize {
        self.reference_reads.load(Ordering::SeqCst)
    }

    pub fn fail_reference_reads(&self, fail: bool) {
        self.fail_reference_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reference_writes(&self, fail: bool) {
        self.fail_reference_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaStore {
    async fn get_by_id(&self, media_id: i64) -> Result<Option<Media>, Error> {
        Ok(self.media.lock().get(&media_id).cloned())
    }
}

#[async_trait]
impl PlatformReferenceRepository for InMemoryMediaStore {
    async fn get_reference(&self, media_id: i64) -> Result<Option<PlatformReference>, Error> {
        self.reference_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reference_reads.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.reference(media_id))
    }

    async fn upsert_reference(
        &self,
        media_id: i64,
        native_ref: &str,
        content_type: &str,
        chat_id: Option<i64>,
    ) -> Result<(), Error> {
        if self.fail_reference_writes.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.references.lock().insert(
            media_id,
            PlatformReference {
                media_id,
                native_ref: native_ref.into(),
                content_type: content_type.into(),
                chat_id,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chat platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Text {
        chat_id: i64,
        message_id: i32,
        text: String,
        format: TextFormat,
        controls: Option<InlineKeyboard>,
    },
    Media {
        chat_id: i64,
        message_id: i32,
        kind: MediaKind,
        source: MediaSource,
        caption: String,
        controls: Option<InlineKeyboard>,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
}

/// Records every outbound call. Fresh uploads (URL sources) get the native
/// reference `tg-file-<message_id>` unless `withhold_references` is on;
/// native references are echoed back.
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    next_message_id: AtomicI32,
    fail_deletes: AtomicBool,
    fail_media: AtomicBool,
    withhold_references: AtomicBool,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI32::new(100),
            fail_deletes: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
            withhold_references: AtomicBool::new(false),
        }
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_media(&self, fail: bool) {
        self.fail_media.store(fail, Ordering::SeqCst);
    }

    /// Delivers URL uploads without handing back a reusable reference.
    pub fn withhold_references(&self, withhold: bool) {
        self.withhold_references.store(withhold, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn deleted(&self) -> Vec<i32> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Delete { message_id, .. } => Some(*message_id),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn media_sends(&self) -> Vec<(MediaKind, MediaSource)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Media { kind, source, .. } => Some((*kind, source.clone())),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<i32, Error> {
        let message_id = self.next_id();
        self.calls.lock().push(PlatformCall::Text {
            chat_id,
            message_id,
            text: text.into(),
            format,
            controls: controls.cloned(),
        });
        Ok(message_id)
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: &MediaSource,
        caption: &str,
        _format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<SentMedia, Error> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(Error::Platform("Bad Request: wrong file identifier".into()));
        }
        let message_id = self.next_id();
        self.calls.lock().push(PlatformCall::Media {
            chat_id,
            message_id,
            kind,
            source: source.clone(),
            caption: caption.into(),
            controls: controls.cloned(),
        });
        let native_ref = match source {
            MediaSource::NativeRef(r) => Some(r.clone()),
            MediaSource::Url(_) if self.withhold_references.load(Ordering::SeqCst) => None,
            MediaSource::Url(_) => Some(format!("tg-file-{message_id}")),
        };
        Ok(SentMedia { message_id, native_ref })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), Error> {
        self.calls.lock().push(PlatformCall::Delete { chat_id, message_id });
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Platform("Bad Request: message to delete not found".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// Hands out `https://blob.test/<key>?ttl=<secs>` and counts calls.
#[derive(Default)]
pub struct CountingBlobStore {
    calls: AtomicUsize,
}

impl CountingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn presign_download(&self, storage_key: &str, ttl: Duration) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://blob.test/{}?ttl={}", storage_key, ttl.as_secs()))
    }
}
