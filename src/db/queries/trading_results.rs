use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::db::filters::{TRADING_RESULTS_TABLE, TradeQuery, TradeRow, decode_row};
use crate::db::models::trading_results::NewTradingResultModel;
use crate::error::SpimexError;

// Postgres accepts at most 65535 bind parameters per statement.
const INSERT_CHUNK_ROWS: usize = 1_000;

/// Whether the table holds at least one trading result
pub async fn any_trading_results(pool: &PgPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (SELECT 1 FROM spimex_trading_results)
        "#,
    )
    .fetch_one(pool)
    .await
}

/// Insert trading results on an open connection (normally inside a transaction)
pub async fn insert_trading_results(
    conn: &mut PgConnection,
    results: &[NewTradingResultModel],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for chunk in results.chunks(INSERT_CHUNK_ROWS) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {TRADING_RESULTS_TABLE} (\
             id, exchange_product_id, exchange_product_name, oil_id, delivery_basis_id, \
             delivery_basis_name, delivery_type_id, volume, total, count, date) "
        ));
        qb.push_values(chunk, |mut row, result| {
            row.push_bind(result.id)
                .push_bind(result.exchange_product_id.clone())
                .push_bind(result.exchange_product_name.clone())
                .push_bind(result.oil_id.clone())
                .push_bind(result.delivery_basis_id.clone())
                .push_bind(result.delivery_basis_name.clone())
                .push_bind(result.delivery_type_id.clone())
                .push_bind(result.volume)
                .push_bind(result.total)
                .push_bind(result.count)
                .push_bind(result.date);
        });
        inserted += qb.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

/// Run a generic filtered query and decode the projected columns
pub async fn select_trading_results(
    pool: &PgPool,
    query: &TradeQuery,
) -> Result<Vec<TradeRow>, SpimexError> {
    let columns = query.projection();
    let mut qb = query.to_query_builder()?;
    let rows = qb.build().fetch_all(pool).await?;

    let decoded = rows
        .iter()
        .map(|row| decode_row(row, &columns))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(decoded)
}
