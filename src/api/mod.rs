//! Read-only JSON API over the stored trading results.
//!
//! - `GET /dates?number_of_days=N`
//! - `GET /trades?oil_id&delivery_type_id&delivery_basis_id&page`
//! - `GET /trades/dynamics?start_date&end_date&oil_id&delivery_type_id&delivery_basis_id`
//!
//! Response bodies are cached until the next daily refresh boundary.

pub mod dates;
pub mod error;
pub mod trades;

use axum::Router;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db::repository::TradeRepository;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<dyn TradeRepository>,
    pub cache: ResponseCache,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Arc<Config>, repo: Arc<dyn TradeRepository>, cache: ResponseCache) -> Self {
        Self { config, repo, cache, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dates", get(dates::get_dates))
        .route("/dates/", get(dates::get_dates))
        .route("/trades", get(trades::get_trading_results))
        .route("/trades/", get(trades::get_trading_results))
        .route("/trades/dynamics", get(trades::get_dynamics))
        .with_state(state)
}

/// Bind `config.api_addr()` and serve until the process is stopped.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = state.config.api_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Trades API listening");
    axum::serve(listener, router(state)).await
}

fn json_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
