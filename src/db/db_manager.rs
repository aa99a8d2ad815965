use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use super::connection;
use super::filters::{TradeQuery, TradeRow};
use super::models::trading_results::NewTradingResultModel;
use super::queries::trading_results as trading_results_queries;
use super::repository::TradeRepository;
use super::schema;
use crate::config::Config;
use crate::error::SpimexError;
use crate::ingestion::excel_parser::ParsedTrade;

#[derive(Debug, Clone)]
pub struct DbManager {
    pub pool: PgPool,
}

impl DbManager {
    /// Creates a new database connection and initializes the schema
    pub async fn init(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = connection::create_pool(config).await?;

        // Ensure schema is initialized (creates tables if needed)
        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TradeRepository for DbManager {
    #[instrument(skip(self), ret)]
    async fn has_trades(&self) -> Result<bool, SpimexError> {
        Ok(trading_results_queries::any_trading_results(&self.pool).await?)
    }

    #[instrument(skip(self, trades), fields(rows = trades.len()))]
    async fn insert_trades(&self, trades: &[ParsedTrade]) -> Result<u64, SpimexError> {
        let models = trades
            .iter()
            .map(NewTradingResultModel::from_parsed)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        let inserted = trading_results_queries::insert_trading_results(&mut tx, &models).await?;
        tx.commit().await?;

        info!(inserted, "Trading results committed");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRow>, SpimexError> {
        let rows = trading_results_queries::select_trading_results(&self.pool, query).await?;
        debug!(row_count = rows.len(), "Trading results query finished");
        Ok(rows)
    }
}
