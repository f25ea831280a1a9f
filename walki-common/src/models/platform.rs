use serde::{Deserialize, Serialize};

/// Markup dialect of a caption or text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Markdown,
    Html,
}

impl TextFormat {
    /// Bot API `parse_mode` value.
    pub fn parse_mode(&self) -> Option<&'static str> {
        match self {
            TextFormat::Plain => None,
            TextFormat::Markdown => Some("Markdown"),
            TextFormat::Html => Some("HTML"),
        }
    }
}

/// Where the platform should take a media payload from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Reference issued by the platform for an earlier upload.
    NativeRef(String),
    /// Publicly fetchable URL (a presigned blob URL in practice).
    Url(String),
}

impl MediaSource {
    pub fn as_str(&self) -> &str {
        match self {
            MediaSource::NativeRef(s) | MediaSource::Url(s) => s,
        }
    }
}

/// Result of a successful media send. `native_ref` is `None` when the
/// platform delivered the message but handed back no reusable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMedia {
    pub message_id: i32,
    pub native_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

/// Rows of inline buttons attached under a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { inline_keyboard: rows }
    }

    pub fn single_row(row: Vec<InlineButton>) -> Self {
        Self { inline_keyboard: vec![row] }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.inline_keyboard.iter().flatten()
    }
}
