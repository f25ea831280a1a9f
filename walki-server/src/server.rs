//! walki-server/src/server.rs
//!
//! Long-polls Telegram and runs route actions, one chat at a time.

use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, warn};

use walki_common::traits::repository_traits::UserRepository;
use walki_core::Error;
use walki_core::platforms::telegram::{TelegramClient, TgCallbackQuery, TgUpdate};
use walki_core::services::{RouteRunAction, RouteSessionService};

use crate::Args;
use crate::context::ServerContext;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ctx = ServerContext::new(&args).await?;
    let dispatcher = Arc::new(Dispatcher {
        telegram: ctx.telegram.clone(),
        users: ctx.users.clone(),
        session: ctx.session.clone(),
        handler_timeout: ctx.handler_timeout,
        chat_locks: ChatLocks::default(),
    });

    info!("Polling for updates...");
    tokio::select! {
        _ = poll_loop(ctx.telegram.clone(), dispatcher, ctx.poll_timeout_secs) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down.");
        }
    }

    info!("{} platform references cached in memory at shutdown", ctx.references.memory_len());
    ctx.db.pool().close().await;
    Ok(())
}

async fn poll_loop(telegram: Arc<TelegramClient>, dispatcher: Arc<Dispatcher>, poll_timeout_secs: u64) {
    let mut offset = 0_i64;
    loop {
        let updates = match telegram.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {:?}", e);
                time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            dispatcher.clone().dispatch(update);
        }
    }
}

struct Dispatcher {
    telegram: Arc<TelegramClient>,
    users: Arc<dyn UserRepository>,
    session: Arc<RouteSessionService>,
    handler_timeout: Duration,
    chat_locks: ChatLocks,
}

/// One mutex per chat with a handler queued or running. Handlers of one chat
/// never overlap, but tokio's mutex does not promise they run in arrival order.
#[derive(Default)]
struct ChatLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ChatLocks {
    fn acquire(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.locks.entry(chat_id).or_default().clone()
    }

    /// Call after the guard is dropped. The entry goes once no other handler holds it;
    /// `remove_if` runs under the shard lock, so `acquire` cannot slip in between.
    fn release(&self, chat_id: i64, lock: Arc<Mutex<()>>) {
        self.locks
            .remove_if(&chat_id, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Dispatcher {
    fn dispatch(self: Arc<Self>, update: TgUpdate) {
        let Some(query) = update.callback_query else {
            debug!("Ignoring update {} without callback query", update.update_id);
            return;
        };

        let chat_id = query.chat_id();
        let lock = self.chat_locks.acquire(chat_id);

        tokio::spawn(async move {
            {
                let _guard = lock.lock().await;
                let result = time::timeout(self.handler_timeout, self.handle_callback(chat_id, &query)).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Callback '{:?}' in chat {} failed: {:?}", query.data, chat_id, e),
                    Err(elapsed) => error!("Callback '{:?}' in chat {} timed out: {}", query.data, chat_id, Error::Timeout(elapsed)),
                }
            }
            self.chat_locks.release(chat_id, lock);
            debug!("{} chats with pending handlers", self.chat_locks.len());
        });
    }

    async fn handle_callback(&self, chat_id: i64, query: &TgCallbackQuery) -> Result<(), Error> {
        // Stops the client-side spinner whatever happens next.
        if let Err(e) = self.telegram.answer_callback_query(&query.id, None).await {
            warn!("answerCallbackQuery {} failed: {:?}", query.id, e);
        }

        let Some(action) = query.data.as_deref().and_then(RouteRunAction::parse) else {
            debug!("Callback {:?} is not a route action", query.data);
            return Ok(());
        };

        let full_name = query.from.full_name();
        let user_id = self
            .users
            .upsert_by_telegram_id(query.from.id, query.from.username.as_deref(), full_name.as_deref())
            .await?;

        debug!("User {} (tg {}) -> {:?}", user_id, query.from.id, action);
        self.session.handle(chat_id, user_id, action).await?;
        Ok(())
    }
}
