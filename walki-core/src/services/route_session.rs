// File: src/services/route_session.rs

use std::sync::Arc;
use tracing::{error, info};

use walki_common::models::{InlineButton, InlineKeyboard, TextFormat};
use walki_common::traits::platform_traits::ChatPlatform;
use crate::services::route_card::{CardRender, RouteCardService};
use crate::services::route_run_service::{RouteRunService, StepOutcome};
use crate::Error;

pub const NOTICE_NO_ACCESS: &str = "No access to this route, or the route is empty.";
pub const NOTICE_ALREADY_STARTED: &str = "You have already started this route. What would you like to do?";
pub const NOTICE_FINISHED: &str = "🏁 Route finished! Open your profile to walk it again.";
pub const NOTICE_FIRST_POINT: &str = "This is the first point of the route.";
pub const NOTICE_NOT_STARTED: &str = "You have not started this route yet.";
pub const NOTICE_THANKS: &str = "🏁 Route finished! Thanks for the walk.";
pub const NOTICE_FAILED: &str = "Something went wrong, please try again.";

/// Callback payloads emitted by route cards and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRunAction {
    Start(i32),
    Continue(i32),
    Restart(i32),
    Next(i32),
    Prev(i32),
    Finish(i32),
}

impl RouteRunAction {
    const PREFIXES: [(&'static str, fn(i32) -> RouteRunAction); 6] = [
        ("start_route:", RouteRunAction::Start),
        ("route_continue:", RouteRunAction::Continue),
        ("route_restart:", RouteRunAction::Restart),
        ("route_next:", RouteRunAction::Next),
        ("route_prev:", RouteRunAction::Prev),
        ("route_finish:", RouteRunAction::Finish),
    ];

    pub fn parse(data: &str) -> Option<Self> {
        Self::PREFIXES.iter().find_map(|(prefix, ctor)| {
            let id = data.strip_prefix(prefix)?.parse::<i32>().ok()?;
            Some(ctor(id))
        })
    }

    pub fn route_id(&self) -> i32 {
        match *self {
            RouteRunAction::Start(id)
            | RouteRunAction::Continue(id)
            | RouteRunAction::Restart(id)
            | RouteRunAction::Next(id)
            | RouteRunAction::Prev(id)
            | RouteRunAction::Finish(id) => id,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            RouteRunAction::Start(_) => "start_route:",
            RouteRunAction::Continue(_) => "route_continue:",
            RouteRunAction::Restart(_) => "route_restart:",
            RouteRunAction::Next(_) => "route_next:",
            RouteRunAction::Prev(_) => "route_prev:",
            RouteRunAction::Finish(_) => "route_finish:",
        }
    }

    pub fn callback_data(&self) -> String {
        format!("{}{}", self.prefix(), self.route_id())
    }
}

/// What the user ended up seeing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReply {
    Card(CardRender),
    ResumePrompt,
    Notice(&'static str),
}

pub struct RouteSessionService {
    run: Arc<RouteRunService>,
    cards: Arc<RouteCardService>,
    platform: Arc<dyn ChatPlatform>,
}

impl RouteSessionService {
    pub fn new(run: Arc<RouteRunService>, cards: Arc<RouteCardService>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { run, cards, platform }
    }

    /// Executes one route action for `user_id` and answers in `chat_id`.
    /// Unexpected engine errors produce a generic notice and are returned to the caller.
    pub async fn handle(&self, chat_id: i64, user_id: i32, action: RouteRunAction) -> Result<SessionReply, Error> {
        match self.dispatch(chat_id, user_id, action).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!("Route action {:?} for user {} failed: {:?}", action, user_id, e);
                self.notice(chat_id, NOTICE_FAILED).await?;
                Err(e)
            }
        }
    }

    async fn dispatch(&self, chat_id: i64, user_id: i32, action: RouteRunAction) -> Result<SessionReply, Error> {
        match action {
            RouteRunAction::Start(route_id) => self.start(chat_id, user_id, route_id).await,
            RouteRunAction::Continue(route_id) | RouteRunAction::Next(route_id) => {
                let outcome = self.run.continue_route(user_id, route_id).await?;
                self.show_step(chat_id, user_id, outcome).await
            }
            RouteRunAction::Prev(route_id) => {
                let outcome = self.run.prev(user_id, route_id).await?;
                self.show_step(chat_id, user_id, outcome).await
            }
            RouteRunAction::Restart(route_id) => {
                let view = self.run.restart(user_id, route_id).await?;
                Ok(SessionReply::Card(self.cards.render(chat_id, user_id, &view).await))
            }
            RouteRunAction::Finish(route_id) => {
                let version = self.run.latest_version(route_id).await?;
                self.run.finish(user_id, version.id).await?;
                info!("User {} finished route {} from the card", user_id, route_id);
                self.notice(chat_id, NOTICE_THANKS).await
            }
        }
    }

    async fn start(&self, chat_id: i64, user_id: i32, route_id: i32) -> Result<SessionReply, Error> {
        let unfinished = self
            .run
            .progress(user_id, route_id)
            .await?
            .is_some_and(|p| !p.is_finished());
        if unfinished {
            let prompt = InlineKeyboard::single_row(vec![
                InlineButton::new("▶️ Continue", RouteRunAction::Continue(route_id).callback_data()),
                InlineButton::new("🔁 Restart", RouteRunAction::Restart(route_id).callback_data()),
            ]);
            self.platform
                .send_text(chat_id, NOTICE_ALREADY_STARTED, TextFormat::Plain, Some(&prompt))
                .await?;
            return Ok(SessionReply::ResumePrompt);
        }

        match self.run.start(user_id, route_id).await {
            Ok(view) => Ok(SessionReply::Card(self.cards.render(chat_id, user_id, &view).await)),
            Err(Error::NoAccess { .. }) | Err(Error::NotFound(_)) => self.notice(chat_id, NOTICE_NO_ACCESS).await,
            Err(e) => Err(e),
        }
    }

    async fn show_step(&self, chat_id: i64, user_id: i32, outcome: StepOutcome) -> Result<SessionReply, Error> {
        match outcome {
            StepOutcome::Moved(view) => Ok(SessionReply::Card(self.cards.render(chat_id, user_id, &view).await)),
            StepOutcome::Finished => self.notice(chat_id, NOTICE_FINISHED).await,
            StepOutcome::AtFirst => self.notice(chat_id, NOTICE_FIRST_POINT).await,
            StepOutcome::NoProgress => self.notice(chat_id, NOTICE_NOT_STARTED).await,
        }
    }

    async fn notice(&self, chat_id: i64, text: &'static str) -> Result<SessionReply, Error> {
        self.platform.send_text(chat_id, text, TextFormat::Plain, None).await?;
        Ok(SessionReply::Notice(text))
    }
}
