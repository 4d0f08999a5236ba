use std::{sync::Arc, time::Duration};

use engine::{Engine, PriceTable};
use migration::{Migrator, MigratorTrait};
use server::{Credentials, ServerState};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "regear={level},telegram_bot={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.ledger.database).await?;
    let engine = Arc::new(
        Engine::builder()
            .database(db)
            .timeout(Duration::from_secs(settings.ledger.timeout_secs))
            .build()
            .await?,
    );

    if let Some(server) = settings.server {
        tracing::info!("Found server settings...");
        let credentials = match (server.username, server.password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };
        let state = ServerState {
            engine: Arc::clone(&engine),
            credentials,
        };
        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        tasks.spawn(async move {
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            if let Err(err) = server::run(state, &bind, server.port, shutdown).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(telegram) = settings.telegram {
        tracing::info!("Found telegram settings...");
        let timezone = match telegram.timezone.as_deref() {
            Some(name) => name
                .parse::<chrono_tz::Tz>()
                .map_err(|err| format!("invalid timezone {name}: {err}"))?,
            None => chrono_tz::Tz::UTC,
        };
        let prices = if settings.prices.is_empty() {
            PriceTable::default()
        } else {
            PriceTable::new(settings.prices)
        };

        let mut builder = telegram_bot::Bot::builder()
            .token(&telegram.token)
            .engine(Arc::clone(&engine))
            .prices(prices)
            .admins(telegram.admins)
            .regear_chat(telegram.regear_chat)
            .approval_chat(telegram.approval_chat)
            .balances_chat(telegram.balances_chat)
            .logs_chat(telegram.logs_chat)
            .timezone(timezone);
        if let Some(path) = telegram.state_path {
            builder = builder.state_path(path);
        }
        let bot = builder.build()?;
        tasks.spawn(async move { bot.run().await });
    }

    if tasks.is_empty() {
        tracing::warn!("neither [server] nor [telegram] is configured, nothing to run");
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.shutdown().await?,
        Err(_) => tracing::warn!("engine still in use at exit, skipping clean shutdown"),
    }

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
