use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ApiError;
use super::{AppState, json_response};
use crate::db::filters::{Column, FilterOp, SortDirection, TradeQuery, TradeRow};
use crate::error::SpimexError;

const OIL_ID_MAX_LEN: usize = 4;
const DELIVERY_TYPE_ID_MAX_LEN: usize = 1;
const DELIVERY_BASIS_ID_MAX_LEN: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct TradesParams {
    pub oil_id: Option<String>,
    pub delivery_type_id: Option<String>,
    pub delivery_basis_id: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DynamicsParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub oil_id: Option<String>,
    pub delivery_type_id: Option<String>,
    pub delivery_basis_id: Option<String>,
}

/// Case-insensitive substring filters on the product id parts. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeFilters {
    pub oil_id: Option<String>,
    pub delivery_type_id: Option<String>,
    pub delivery_basis_id: Option<String>,
}

impl TradeFilters {
    pub fn validate(
        oil_id: Option<String>,
        delivery_type_id: Option<String>,
        delivery_basis_id: Option<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            oil_id: bounded("oil_id", oil_id, OIL_ID_MAX_LEN)?,
            delivery_type_id: bounded("delivery_type_id", delivery_type_id, DELIVERY_TYPE_ID_MAX_LEN)?,
            delivery_basis_id: bounded("delivery_basis_id", delivery_basis_id, DELIVERY_BASIS_ID_MAX_LEN)?,
        })
    }

    fn apply(&self, mut query: TradeQuery) -> TradeQuery {
        let filters = [
            (Column::OilId, &self.oil_id),
            (Column::DeliveryTypeId, &self.delivery_type_id),
            (Column::DeliveryBasisId, &self.delivery_basis_id),
        ];
        for (column, value) in filters {
            if let Some(needle) = value {
                query = query.filter(column, FilterOp::ContainsIgnoreCase(needle.clone()));
            }
        }
        query
    }
}

// Blank values mean "no filter".
fn bounded(name: &str, value: Option<String>, max_len: usize) -> Result<Option<String>, ApiError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max_len {
        return Err(ApiError::Unprocessable(format!(
            "{name} must be at most {max_len} characters, got {value:?}"
        )));
    }
    Ok(Some(value))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradesRequest {
    pub filters: TradeFilters,
    pub page: i64,
}

impl TradesRequest {
    pub fn validate(params: TradesParams) -> Result<Self, ApiError> {
        let page = params.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::Unprocessable(format!("page must be at least 1, got {page}")));
        }
        let filters = TradeFilters::validate(params.oil_id, params.delivery_type_id, params.delivery_basis_id)?;
        Ok(Self { filters, page })
    }

    /// Newest first, `page_size` rows per page.
    pub fn query(&self, page_size: u32) -> TradeQuery {
        let page_size = i64::from(page_size);
        let query = TradeQuery::new()
            .order_by(Column::Date, SortDirection::Desc)
            .limit(page_size)
            .offset(page_size.saturating_mul(self.page - 1));
        self.filters.apply(query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicsRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub filters: TradeFilters,
}

impl DynamicsRequest {
    pub fn validate(params: DynamicsParams) -> Result<Self, ApiError> {
        if params.start_date > params.end_date {
            return Err(ApiError::Unprocessable(format!(
                "start_date {} is after end_date {}",
                params.start_date, params.end_date
            )));
        }
        let filters = TradeFilters::validate(params.oil_id, params.delivery_type_id, params.delivery_basis_id)?;
        Ok(Self { start_date: params.start_date, end_date: params.end_date, filters })
    }

    /// Every trade in the inclusive range, oldest first.
    pub fn query(&self) -> TradeQuery {
        let query = TradeQuery::new()
            .filter(Column::Date, FilterOp::GreaterOrEqual(self.start_date.into()))
            .filter(Column::Date, FilterOp::LessOrEqual(self.end_date.into()))
            .order_by(Column::Date, SortDirection::Asc);
        self.filters.apply(query)
    }
}

#[derive(Debug, Serialize)]
struct TradesResponse {
    trades: Vec<TradeRow>,
}

/// Paginated trading results, optionally filtered by product id parts.
#[instrument(skip(state))]
pub async fn get_trading_results(
    State(state): State<AppState>,
    params: Result<Query<TradesParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let request = TradesRequest::validate(params)?;
    let query = request.query(state.config.page_size);
    cached_trades(&state, "trades", &request, &query).await
}

/// Trading results between two dates (inclusive), unpaginated.
#[instrument(skip(state))]
pub async fn get_dynamics(
    State(state): State<AppState>,
    params: Result<Query<DynamicsParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let request = DynamicsRequest::validate(params)?;
    let query = request.query();
    cached_trades(&state, "dynamics", &request, &query).await
}

async fn cached_trades<R: Serialize>(
    state: &AppState,
    endpoint: &str,
    request: &R,
    query: &TradeQuery,
) -> Result<Response, ApiError> {
    let key = state.cache.key(endpoint, request)?;
    let body = state
        .cache
        .get_or_compute(&key, state.clock.now(), || async {
            let trades = state.repo.query_trades(query).await?;
            debug!(endpoint, row_count = trades.len(), "Trades queried");
            let body = serde_json::to_string(&TradesResponse { trades })?;
            Ok::<_, SpimexError>(body)
        })
        .await?;
    Ok(json_response(body))
}
