use dotenvy::dotenv;
use eyre::Result;
use std::sync::Arc;
use tracing::info;

use spimex_trades::api::{self, AppState};
use spimex_trades::cache::{RedisCache, ResponseCache};
use spimex_trades::config::Config;
use spimex_trades::db::db_manager::DbManager;
use spimex_trades::logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Arc::new(Config::load()?);
    info!(api_addr = %cfg.api_addr(), "Configuration loaded and logging initialized");

    let db = DbManager::init(&cfg).await?;
    info!("Database manager initialized");

    let redis = RedisCache::connect(&cfg.redis_url).await?;
    let cache = ResponseCache::new(Arc::new(redis), cfg.cache_prefix.clone(), cfg.cache_refresh_time);

    api::serve(AppState::new(cfg, Arc::new(db), cache)).await?;
    Ok(())
}
