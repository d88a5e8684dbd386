use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod bot;
mod config;
mod db;
mod llm;
mod pipeline;
mod util;

use crate::bot::api::TelegramApi;
use crate::config::{AppConfig, CliArgs};
use crate::db::executor::QueryExecutor;
use crate::db::pool::DuckDbConnectionManager;
use crate::llm::yandex::YandexGptClient;
use crate::pipeline::Pipeline;
use crate::util::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = CliArgs::parse();

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Opening metrics database at {}",
        config.database.connection_string
    );
    let db_manager = DuckDbConnectionManager::new(config.database.connection_string.clone());
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(db_manager)?;

    db::schema::apply_schema(&pool)?;

    // Seed-import mode: load the file and exit without starting the bot.
    if let Some(seed_path) = &args.load_seed {
        let (videos, snapshots) = db::loader::load_seed_file(&pool, seed_path, !args.no_truncate)?;
        info!("Loaded videos={}, snapshots={}", videos, snapshots);
        return Ok(());
    }

    let gateway = YandexGptClient::new(&config.llm)?;
    let executor = QueryExecutor::new(
        pool,
        Duration::from_secs_f64(config.database.timeout_seconds),
    );
    let pipeline = Arc::new(Pipeline::new(Arc::new(gateway), executor));

    let api = TelegramApi::new(&config.telegram.token, config.telegram.poll_timeout_seconds)?;

    info!("Starting vidstat bot");
    bot::run(api, pipeline, config.telegram.poll_timeout_seconds).await?;

    Ok(())
}
