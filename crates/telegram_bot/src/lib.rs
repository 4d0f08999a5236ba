//! Telegram bot.
//!
//! The bot is the chat face of one community: members post regear requests
//! in the regear chat, reviewers resolve them from the approval board, and
//! everyone checks balances with slash commands. All ledger and queue work
//! goes through the shared [`Engine`]; the bot only renders and relays.

use std::{path::PathBuf, sync::Arc};

use chrono_tz::Tz;
use engine::{CommunityId, Engine, PriceTable};
use teloxide::prelude::*;

mod commands;
mod handlers;
mod parsing;
mod state;
mod ui;

const DEFAULT_STATE_PATH: &str = "config/telegram_bot_state.json";

/// Chats the bot works with.
#[derive(Clone, Copy, Debug)]
struct Chats {
    /// Where members post regear requests; its id is the community id.
    regear: ChatId,
    approval: ChatId,
    balances: Option<ChatId>,
    logs: Option<ChatId>,
}

#[derive(Clone)]
pub struct ConfigParameters {
    engine: Arc<Engine>,
    prices: Arc<PriceTable>,
    admins: Arc<Vec<UserId>>,
    chats: Chats,
    timezone: Tz,
    boards: state::BoardStore,
}

impl ConfigParameters {
    fn community(&self) -> CommunityId {
        CommunityId(self.chats.regear.0)
    }
}

pub struct Bot {
    token: String,
    engine: Arc<Engine>,
    prices: Arc<PriceTable>,
    admins: Arc<Vec<UserId>>,
    chats: Chats,
    timezone: Tz,
    state_path: PathBuf,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let parameters = ConfigParameters {
            engine: Arc::clone(&self.engine),
            prices: Arc::clone(&self.prices),
            admins: Arc::clone(&self.admins),
            chats: self.chats,
            timezone: self.timezone,
            boards: state::BoardStore::load_or_empty(self.state_path.clone()),
        };

        handlers::refresh_approval_board(&bot, &parameters).await;
        handlers::refresh_balances_board(&bot, &parameters).await;

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message))
            .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::debug!("Unhandled update: {:?}", upd.kind);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        tracing::info!("Telegram bot stopped");
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    engine: Option<Arc<Engine>>,
    prices: Option<PriceTable>,
    admins: Vec<UserId>,
    regear_chat: Option<ChatId>,
    approval_chat: Option<ChatId>,
    balances_chat: Option<ChatId>,
    logs_chat: Option<ChatId>,
    timezone: Option<Tz>,
    state_path: Option<PathBuf>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn engine(mut self, engine: Arc<Engine>) -> BotBuilder {
        self.engine = Some(engine);
        self
    }

    /// Item prices used to value requests. Defaults to the built-in table.
    pub fn prices(mut self, prices: PriceTable) -> BotBuilder {
        self.prices = Some(prices);
        self
    }

    /// Users allowed to resolve requests and run the admin commands.
    pub fn admins(mut self, admins: impl IntoIterator<Item = u64>) -> BotBuilder {
        self.admins = admins.into_iter().map(UserId).collect();
        self
    }

    pub fn regear_chat(mut self, chat: i64) -> BotBuilder {
        self.regear_chat = Some(ChatId(chat));
        self
    }

    pub fn approval_chat(mut self, chat: i64) -> BotBuilder {
        self.approval_chat = Some(ChatId(chat));
        self
    }

    pub fn balances_chat(mut self, chat: Option<i64>) -> BotBuilder {
        self.balances_chat = chat.map(ChatId);
        self
    }

    pub fn logs_chat(mut self, chat: Option<i64>) -> BotBuilder {
        self.logs_chat = chat.map(ChatId);
        self
    }

    /// Timezone of the timestamps shown to users. Defaults to UTC.
    pub fn timezone(mut self, timezone: Tz) -> BotBuilder {
        self.timezone = Some(timezone);
        self
    }

    pub fn state_path(mut self, path: impl Into<PathBuf>) -> BotBuilder {
        self.state_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.is_empty() {
            return Err("telegram token missing".to_string());
        }
        let engine = self.engine.ok_or("engine missing")?;
        let regear = self.regear_chat.ok_or("regear chat missing")?;
        let approval = self.approval_chat.ok_or("approval chat missing")?;
        if self.admins.is_empty() {
            tracing::warn!("no admins configured, nobody can resolve regear requests");
        }

        Ok(Bot {
            token: self.token,
            engine,
            prices: Arc::new(self.prices.unwrap_or_default()),
            admins: Arc::new(self.admins),
            chats: Chats {
                regear,
                approval,
                balances: self.balances_chat,
                logs: self.logs_chat,
            },
            timezone: self.timezone.unwrap_or(Tz::UTC),
            state_path: self
                .state_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
        })
    }
}
