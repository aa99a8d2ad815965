use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ApiError;
use super::{AppState, json_response};
use crate::db::filters::{Column, FilterOp, SortDirection, TradeQuery, TradeRow};
use crate::error::SpimexError;

pub const DEFAULT_NUMBER_OF_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct DatesParams {
    pub number_of_days: Option<i64>,
}

/// Validated `/dates` request: the earliest trade date to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatesRequest {
    pub since: NaiveDate,
}

impl DatesRequest {
    /// An explicit `number_of_days` must lie in `1..=days since start_date`
    /// (at least 1). Without one the window is 30 days, shortened to that bound.
    pub fn validate(params: DatesParams, today: NaiveDate, start_date: NaiveDate) -> Result<Self, ApiError> {
        let max_days = (today - start_date).num_days().max(1);
        let number_of_days = match params.number_of_days {
            Some(days) if !(1..=max_days).contains(&days) => {
                return Err(ApiError::Unprocessable(format!(
                    "number_of_days must be between 1 and {max_days}, got {days}"
                )));
            }
            Some(days) => days,
            None => DEFAULT_NUMBER_OF_DAYS.min(max_days),
        };
        Ok(Self { since: today - Duration::days(number_of_days) })
    }

    pub fn query(&self) -> TradeQuery {
        TradeQuery::new()
            .select([Column::Date])
            .filter(Column::Date, FilterOp::GreaterOrEqual(self.since.into()))
            .distinct()
            .order_by(Column::Date, SortDirection::Asc)
    }
}

#[derive(Debug, Serialize)]
struct DatesResponse {
    dates: Vec<TradeRow>,
}

/// Distinct trade dates of the trailing window, oldest first.
#[instrument(skip(state))]
pub async fn get_dates(
    State(state): State<AppState>,
    params: Result<Query<DatesParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let now = state.clock.now();
    let request = DatesRequest::validate(params, now.date_naive(), state.config.start_date)?;

    let key = state.cache.key("dates", &request)?;
    let body = state
        .cache
        .get_or_compute(&key, now, || async {
            let dates = state.repo.query_trades(&request.query()).await?;
            debug!(date_count = dates.len(), "Dates queried");
            let body = serde_json::to_string(&DatesResponse { dates })?;
            Ok::<_, SpimexError>(body)
        })
        .await?;

    Ok(json_response(body))
}
