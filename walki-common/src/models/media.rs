use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored binary asset. Immutable after upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub id: i64,
    pub media_type: String,
    pub filename: Option<String>,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_key: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Media {
    /// Object key, if the media was ever uploaded to blob storage.
    pub fn storage_key(&self) -> Option<&str> {
        self.storage_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn mime(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("")
    }
}

/// Which platform send operation carries a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Audio,
    Document,
}

impl MediaKind {
    /// Coarse classification from the MIME family alone.
    pub fn classify(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Photo
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }

    /// Narrows a coarse kind to what the platform renders reliably.
    /// Photos must literally be jpeg/png and audio literally `audio/*`,
    /// everything else goes out as a document.
    pub fn for_delivery(self, mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        match self {
            MediaKind::Photo if is_photo_mime(&mime) => MediaKind::Photo,
            MediaKind::Audio if mime.starts_with("audio/") => MediaKind::Audio,
            _ => MediaKind::Document,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}

fn is_photo_mime(mime: &str) -> bool {
    matches!(mime, "image/jpeg" | "image/jpg" | "image/pjpeg" | "image/png")
}

/// Cached platform-native reference for a media item.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformReference {
    pub media_id: i64,
    pub native_ref: String,
    pub content_type: String,
    pub chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
