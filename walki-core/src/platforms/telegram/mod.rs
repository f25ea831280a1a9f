pub mod client;
pub mod models;

pub use client::TelegramClient;
pub use models::{TgCallbackQuery, TgChat, TgMessage, TgUpdate, TgUser};
