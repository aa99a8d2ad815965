use thiserror::Error;

pub type Result<T, E = SpimexError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SpimexError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware failed: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Spreadsheet could not be read: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Spreadsheet has no worksheets")]
    EmptyWorkbook,

    #[error("Spreadsheet is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Exchange product id {0:?} is too short to decompose")]
    InvalidProductId(String),

    #[error("Invalid trade date {0:?}, expected DD.MM.YYYY")]
    InvalidTradeDate(String),

    #[error("Invalid CSS selector {0:?}")]
    InvalidSelector(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
