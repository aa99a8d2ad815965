use async_trait::async_trait;

use crate::db::filters::{TradeQuery, TradeRow};
use crate::error::SpimexError;
use crate::ingestion::excel_parser::ParsedTrade;

/// Storage operations the crawler and the API depend on.
#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// True when at least one trading result has been stored.
    async fn has_trades(&self) -> Result<bool, SpimexError>;

    /// Store one parsed spreadsheet atomically; returns the number of rows written.
    async fn insert_trades(&self, trades: &[ParsedTrade]) -> Result<u64, SpimexError>;

    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRow>, SpimexError>;
}
