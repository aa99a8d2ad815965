use sqlx::{
    Executor,
    postgres::PgPool,
};

pub const TRADING_RESULTS_DDL: &str = include_str!("spimex_trading_results.sql");

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(TRADING_RESULTS_DDL).await?;

    // Date windows and ranges are the hot path of the API
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_spimex_trading_results_date
        ON spimex_trading_results(date);
        "#
    )
    .execute(pool)
    .await?;

    Ok(())
}
