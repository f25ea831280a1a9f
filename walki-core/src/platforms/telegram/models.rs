//! JSON shapes of the Bot API objects the bot reads. Only the fields we use
//! are modelled; serde skips the rest.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TgUser {
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    pub file_unique_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgPhotoSize {
    pub file_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i32,
    pub chat: Option<TgChat>,
    pub from: Option<TgUser>,
    pub text: Option<String>,
    /// Sizes in ascending order; the last one is the original.
    pub photo: Option<Vec<TgPhotoSize>>,
    pub audio: Option<TgFile>,
    pub voice: Option<TgFile>,
    pub document: Option<TgFile>,
    pub animation: Option<TgFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

impl TgCallbackQuery {
    /// Chat the pressed button lives in; private chats share the user's id.
    pub fn chat_id(&self) -> i64 {
        self.message
            .as_ref()
            .and_then(|m| m.chat.as_ref())
            .map(|c| c.id)
            .unwrap_or(self.from.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<TgCallbackQuery>,
}

/// Body of sendMessage.
#[derive(Debug, Serialize)]
pub(crate) struct SendMessageBody<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a walki_common::models::InlineKeyboard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteMessageBody {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesBody<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerCallbackBody<'a> {
    pub callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}
