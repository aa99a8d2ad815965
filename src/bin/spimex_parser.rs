use dotenvy::dotenv;
use eyre::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use spimex_trades::api::{self, AppState};
use spimex_trades::cache::{RedisCache, ResponseCache};
use spimex_trades::config::Config;
use spimex_trades::db::db_manager::DbManager;
use spimex_trades::ingestion::crawler::Crawler;
use spimex_trades::ingestion::http_client::SpimexClient;
use spimex_trades::logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Arc::new(Config::load()?);
    info!(
        start_url = %cfg.start_url,
        start_date = %cfg.start_date,
        "Configuration loaded and logging initialized"
    );

    let db = Arc::new(DbManager::init(&cfg).await?);
    info!("Database manager initialized");

    let client = Arc::new(SpimexClient::new(&cfg)?);
    let crawler = Crawler::new(Arc::clone(&cfg), client, db.clone())?;

    let started = Instant::now();
    let summary = match crawler.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Crawl failed");
            return Err(e.into());
        }
    };
    info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        pages_visited = summary.pages_visited,
        files_parsed = summary.files_parsed,
        rows_inserted = summary.rows_inserted,
        "Trading results ingested"
    );

    let redis = RedisCache::connect(&cfg.redis_url).await?;
    let cache = ResponseCache::new(Arc::new(redis), cfg.cache_prefix.clone(), cfg.cache_refresh_time);

    api::serve(AppState::new(cfg, db, cache)).await?;
    Ok(())
}
