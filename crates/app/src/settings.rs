//! Process settings, read from `config/settings.toml` and overridden by
//! `REGEAR__*` environment variables (for example
//! `REGEAR__TELEGRAM__TOKEN`).

use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_SETTINGS_PATH: &str = "config/settings";
const ENV_PREFIX: &str = "REGEAR";

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("regear.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub database: Database,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            database: Database::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default)]
    pub admins: Vec<u64>,
    pub regear_chat: i64,
    pub approval_chat: i64,
    pub balances_chat: Option<i64>,
    pub logs_chat: Option<i64>,
    pub timezone: Option<String>,
    pub state_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub ledger: Ledger,
    /// Item code to silver. Replaces the built-in price table when set.
    #[serde(default)]
    pub prices: HashMap<String, i64>,
    pub server: Option<Server>,
    pub telegram: Option<Telegram>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(
            Config::builder().add_source(File::with_name(DEFAULT_SETTINGS_PATH).required(false)),
        )
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.admins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
