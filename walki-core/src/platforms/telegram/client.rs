// File: src/platforms/telegram/client.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use walki_common::models::{InlineKeyboard, MediaKind, MediaSource, SentMedia, TextFormat};
use walki_common::traits::platform_traits::ChatPlatform;
use crate::Error;
use super::models::{
    AnswerCallbackBody, DeleteMessageBody, GetUpdatesBody, SendMessageBody, TgFile, TgMessage,
    TgResponse, TgUpdate,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Thin Bot API client. Holds the token inside `base_url`, so that string is
/// never logged.
#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, bot_token: &str) -> Self {
        Self::with_client(Client::new(), api_url, bot_token)
    }

    pub fn with_client(http_client: Client, api_url: &str, bot_token: &str) -> Self {
        Self {
            http_client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        }
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, Error> {
        let envelope: TgResponse<T> = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if !envelope.ok {
            return Err(Error::Platform(format!(
                "{} failed ({}): {}",
                method,
                envelope.error_code.unwrap_or_default(),
                envelope.description.unwrap_or_else(|| "no description".into())
            )));
        }
        envelope
            .result
            .ok_or_else(|| Error::Platform(format!("{} returned no result", method)))
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<TgUpdate>, Error> {
        let body = GetUpdatesBody {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &body).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> Result<(), Error> {
        let body = AnswerCallbackBody { callback_query_id, text };
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

/// Bot API method and payload field for each media kind.
fn media_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Photo => ("sendPhoto", "photo"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Document => ("sendDocument", "document"),
    }
}

/// Pulls the reusable file id of the object a send produced. Telegram may
/// store an upload as a different object than the method asked for (an ogg
/// sent with sendAudio can come back as a voice or a document), so the other
/// file fields are tried after the requested one.
pub(crate) fn native_ref_of(kind: MediaKind, message: &TgMessage) -> Option<String> {
    let photo = || {
        message
            .photo
            .as_ref()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file_id.clone())
    };
    let file = |f: &Option<TgFile>| f.as_ref().map(|f| f.file_id.clone());

    let requested = match kind {
        MediaKind::Photo => photo(),
        MediaKind::Audio => file(&message.audio),
        MediaKind::Document => file(&message.document),
    };
    requested
        .into_iter()
        .chain([
            file(&message.audio),
            file(&message.voice),
            file(&message.document),
            file(&message.animation),
            photo(),
        ].into_iter().flatten())
        .find(|id| !id.is_empty())
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<i32, Error> {
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: format.parse_mode(),
            reply_markup: controls,
        };
        let sent: TgMessage = self.call("sendMessage", &body).await?;
        Ok(sent.message_id)
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: &MediaSource,
        caption: &str,
        format: TextFormat,
        controls: Option<&InlineKeyboard>,
    ) -> Result<SentMedia, Error> {
        let (method, field) = media_method(kind);

        let mut body = json!({ "chat_id": chat_id });
        body[field] = Value::String(source.as_str().to_string());
        if !caption.is_empty() {
            body["caption"] = Value::String(caption.to_string());
            if let Some(mode) = format.parse_mode() {
                body["parse_mode"] = Value::String(mode.to_string());
            }
        }
        if let Some(kb) = controls {
            body["reply_markup"] = serde_json::to_value(kb)?;
        }

        let sent: TgMessage = self.call(method, &body).await?;
        let native_ref = match (native_ref_of(kind, &sent), source) {
            (Some(r), _) => Some(r),
            // The platform already knows this object; keep using what we sent.
            (None, MediaSource::NativeRef(r)) => {
                debug!("{} echoed no file_id, reusing cached reference", method);
                Some(r.clone())
            }
            (None, MediaSource::Url(_)) => {
                warn!("{} delivered message {} without a file_id", method, sent.message_id);
                None
            }
        };

        Ok(SentMedia {
            message_id: sent.message_id,
            native_ref,
        })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), Error> {
        let body = DeleteMessageBody { chat_id, message_id };
        let _: bool = self.call("deleteMessage", &body).await?;
        Ok(())
    }
}
