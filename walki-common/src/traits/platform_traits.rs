use async_trait::async_trait;
use crate::error::Error;
use crate::models::{InlineKeyboard, MediaKind, MediaSource, SentMedia, TextFormat};

/// Outbound side of a chat platform, as far as route playback needs it.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Sends a text message and returns its message id.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<i32, Error>;

    /// Sends a media message through the operation that matches `kind`.
    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: &MediaSource,
        caption: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<SentMedia, Error>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), Error>;
}
