use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, Layer, Registry};

use crate::config::read_config;
use crate::database::database::Database;
use crate::discord::bot::DiscordBot;

mod cogs;
mod config;
mod database;
mod discord;
mod starboard;
mod utils;
mod worksheets;

const CONFIG_PATH: &str = "config/config.yaml";

fn main() -> anyhow::Result<()> {
    let config = read_config(CONFIG_PATH)?;
    let (_file_guard, _stdout_guard) = init_logging(config.level_filter());

    let span = tracing::span!(tracing::Level::INFO, "main", guild = config.home_guild_id);
    let _enter = span.enter();
    tracing::info!("Starting administrator with prefix {}", config.prefix);

    let database = Database::new(&config.database_path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let stored = database.begin_transaction().await?.count_starred_messages()?;
        tracing::info!("Opened database at {} with {} starred messages", config.database_path.display(), stored);

        let discord_bot = DiscordBot::new(config, database).await?;
        discord_bot.run_bot().await?;
        anyhow::Ok(())
    })?;

    tracing::info!("Goodbye");
    Ok(())
}

fn init_logging(level: LevelFilter) -> (tracing_appender::non_blocking::WorkerGuard, tracing_appender::non_blocking::WorkerGuard) {
    let file_appender = tracing_appender::rolling::hourly("logs/", "administrator.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(level);

    let (non_blocking, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_thread_ids(true)
        .with_target(false)
        .with_writer(non_blocking)
        .with_filter(level);

    Registry::default().with(file_layer).with(stdout_layer).init();

    (file_guard, stdout_guard)
}
