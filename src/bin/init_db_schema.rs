use dotenvy::dotenv;
use eyre::Result;
use tracing::{info, warn};

use spimex_trades::config::Config;
use spimex_trades::db::db_manager::DbManager;
use spimex_trades::db::filters::TRADING_RESULTS_TABLE;
use spimex_trades::db::repository::TradeRepository;
use spimex_trades::logging;

/// Create the trading-results table and its date index, then report whether
/// the parser would crawl against it.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::load()?;
    let db = DbManager::init(&cfg).await?;
    info!(table = TRADING_RESULTS_TABLE, "Schema ready");

    if db.has_trades().await? {
        warn!(
            table = TRADING_RESULTS_TABLE,
            "Table already holds trading results; spimex_parser will skip the crawl"
        );
    } else {
        info!(start_date = %cfg.start_date, "Table is empty; spimex_parser will crawl back to START_DATE");
    }

    Ok(())
}
