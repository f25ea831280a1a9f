// File: src/services/route_card.rs
//
// Keeps exactly one waypoint card at the bottom of the chat: the previous
// content and voice messages are deleted, fresh ones are sent and their ids
// are written back to the progress row.

use std::sync::Arc;
use tracing::{debug, error, warn};

use walki_common::models::{InlineButton, InlineKeyboard, MessageIdUpdate, TextFormat};
use walki_common::traits::platform_traits::ChatPlatform;
use crate::services::media_service::MediaService;
use crate::services::route_run_service::{PointView, RouteRunService};
use crate::services::route_session::RouteRunAction;
use crate::Error;

/// Title and description budgets; with coordinates and the map link the
/// caption stays under Telegram's 1024-char limit.
const MAX_TITLE_CHARS: usize = 64;
const MAX_DESCRIPTION_CHARS: usize = 850;

/// Message ids of the card that was just put on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardRender {
    pub content_message_id: Option<i32>,
    pub voice_message_id: Option<i32>,
}

pub struct RouteCardService {
    platform: Arc<dyn ChatPlatform>,
    media: Arc<MediaService>,
    run: Arc<RouteRunService>,
}

impl RouteCardService {
    pub fn new(platform: Arc<dyn ChatPlatform>, media: Arc<MediaService>, run: Arc<RouteRunService>) -> Self {
        Self { platform, media, run }
    }

    /// Replaces whatever card the user currently sees with `view`.
    /// Step failures are logged; a failed content send still lets the voice go out.
    pub async fn render(&self, chat_id: i64, user_id: i32, view: &PointView) -> CardRender {
        let controls = nav_keyboard(view.route_id, view.has_prev, view.has_next);
        let caption = build_caption(view);

        self.delete_if_exists(chat_id, view.content_message_id).await;
        self.delete_if_exists(chat_id, view.voice_message_id).await;

        let content_message_id = match self.send_fresh_content(chat_id, user_id, view, &caption, &controls).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("send fresh content for point {}: {:?}", view.point.id, e);
                None
            }
        };
        let voice_message_id = match self.send_fresh_voice(chat_id, user_id, view).await {
            Ok(id) => id,
            Err(e) => {
                error!("send fresh voice for point {}: {:?}", view.point.id, e);
                None
            }
        };

        CardRender { content_message_id, voice_message_id }
    }

    async fn delete_if_exists(&self, chat_id: i64, message_id: Option<i32>) {
        let Some(message_id) = message_id.filter(|id| *id != 0) else {
            return;
        };
        // The user may have deleted it already.
        if let Err(e) = self.platform.delete_message(chat_id, message_id).await {
            warn!("delete message {} in chat {}: {:?}", message_id, chat_id, e);
        }
    }

    async fn send_fresh_content(
        &self,
        chat_id: i64,
        user_id: i32,
        view: &PointView,
        caption: &str,
        controls: &InlineKeyboard,
    ) -> Result<i32, Error> {
        let message_id = match view.photo_ids.first() {
            Some(&photo_id) => {
                self.media
                    .send_media(chat_id, photo_id, caption, TextFormat::Markdown, Some(controls))
                    .await?
                    .message_id
            }
            None => {
                self.platform
                    .send_text(chat_id, caption, TextFormat::Markdown, Some(controls))
                    .await?
            }
        };

        self.run
            .update_message_ids(user_id, view.version_id, MessageIdUpdate::Set(message_id), MessageIdUpdate::Unset)
            .await?;
        Ok(message_id)
    }

    async fn send_fresh_voice(&self, chat_id: i64, user_id: i32, view: &PointView) -> Result<Option<i32>, Error> {
        let Some(&voice_id) = view.voice_ids.first() else {
            debug!("Point {} has no narration, clearing stored voice message", view.point.id);
            self.run
                .update_message_ids(user_id, view.version_id, MessageIdUpdate::Unset, MessageIdUpdate::Clear)
                .await?;
            return Ok(None);
        };

        let sent = self
            .media
            .send_media(chat_id, voice_id, "", TextFormat::Plain, None)
            .await?;
        self.run
            .update_message_ids(user_id, view.version_id, MessageIdUpdate::Unset, MessageIdUpdate::Set(sent.message_id))
            .await?;
        Ok(Some(sent.message_id))
    }
}

/// Previous button iff there is a previous waypoint; then exactly one of next or finish.
pub fn nav_keyboard(route_id: i32, has_prev: bool, has_next: bool) -> InlineKeyboard {
    let mut row = Vec::with_capacity(2);
    if has_prev {
        row.push(InlineButton::new("◀️ Back", RouteRunAction::Prev(route_id).callback_data()));
    }
    if has_next {
        row.push(InlineButton::new("▶️ Next", RouteRunAction::Next(route_id).callback_data()));
    } else {
        row.push(InlineButton::new("🏁 Finish", RouteRunAction::Finish(route_id).callback_data()));
    }
    InlineKeyboard::single_row(row)
}

pub fn build_caption(view: &PointView) -> String {
    let title = format!("📍 *{}*", escape_trimmed(MAX_TITLE_CHARS, &view.point.title));
    let description = escape_trimmed(MAX_DESCRIPTION_CHARS, &view.point.description);
    let lat = format!("{:.6}", view.point.latitude);
    let lon = format!("{:.6}", view.point.longitude);
    let maps_url = format!(
        "https://maps.google.com/?q={}",
        urlencoding::encode(&format!("{},{}", lat, lon))
    );

    // Plain URL rather than a Markdown link: fewer ways to trip the parser.
    format!("{}\n\n{}\n\n`{}, {}`\n{}", title, description, lat, lon, maps_url)
}

/// Escapes the characters legacy Markdown treats as markup.
pub fn escape_markdown(s: &str) -> String {
    escape_trimmed(usize::MAX, s)
}

/// Escapes `s` and cuts the result to `max_chars`, ending in `…` when cut.
/// An escape pair is never split.
fn escape_trimmed(max_chars: usize, s: &str) -> String {
    let mut out = String::new();
    let mut len = 0;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        let escaped = matches!(c, '_' | '*' | '`' | '[');
        let width = if escaped { 2 } else { 1 };
        let reserve = if chars.peek().is_some() { 1 } else { 0 };
        if len + width + reserve > max_chars {
            out.push('…');
            break;
        }
        if escaped {
            out.push('\\');
        }
        out.push(c);
        len += width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use walki_common::models::RoutePoint;

    fn view(title: &str, description: &str) -> PointView {
        PointView {
            point: RoutePoint {
                id: 1,
                version_id: 1,
                idx: 0,
                title: title.into(),
                description: description.into(),
                latitude: 55.751244,
                longitude: 37.618423,
                created_at: Utc::now(),
            },
            photo_ids: vec![],
            voice_ids: vec![],
            route_id: 3,
            version_id: 1,
            idx: 0,
            has_prev: false,
            has_next: true,
            content_message_id: None,
            voice_message_id: None,
        }
    }

    #[test]
    fn caption_escapes_and_links_coordinates() {
        let caption = build_caption(&view("Red_Square", "The *heart* of [Moscow]"));
        assert!(caption.starts_with("📍 *Red\\_Square*\n\n"));
        assert!(caption.contains("The \\*heart\\* of \\[Moscow]"));
        assert!(caption.contains("`55.751244, 37.618423`"));
        assert!(caption.ends_with("https://maps.google.com/?q=55.751244%2C37.618423"));
    }

    #[test]
    fn long_description_is_trimmed() {
        let long = "a".repeat(2000);
        let caption = build_caption(&view("T", &long));
        let description = caption.split("\n\n").nth(1).unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.ends_with('…'));
    }

    #[test]
    fn long_title_keeps_caption_within_limit() {
        let caption = build_caption(&view(&"_".repeat(500), &"*".repeat(2000)));
        let title = caption.split("\n\n").next().unwrap();
        assert!(title.ends_with("…*"));
        assert!(caption.chars().count() <= 1024);
    }

    #[test]
    fn trimming_never_splits_an_escape() {
        let cut = escape_trimmed(4, "a_b_c");
        assert_eq!(cut, "a\\_…");
        assert_eq!(escape_trimmed(5, "a_b"), "a\\_b");
        assert_eq!(escape_markdown("x]y"), "x]y");
    }

    #[test]
    fn keyboard_never_has_next_and_finish_together() {
        let middle = nav_keyboard(7, true, true);
        let data: Vec<_> = middle.buttons().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, vec!["route_prev:7", "route_next:7"]);

        let last = nav_keyboard(7, true, false);
        let data: Vec<_> = last.buttons().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, vec!["route_prev:7", "route_finish:7"]);

        let only = nav_keyboard(7, false, false);
        let data: Vec<_> = only.buttons().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, vec!["route_finish:7"]);
    }
}
