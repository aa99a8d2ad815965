use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::SpimexError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Query string could not be deserialized.
    #[error("{0}")]
    BadRequest(String),

    /// Parameters were well-formed but out of range.
    #[error("{0}")]
    Unprocessable(String),

    #[error(transparent)]
    Internal(#[from] SpimexError),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => {
                warn!(%detail, "Rejected malformed query");
                (StatusCode::BAD_REQUEST, detail)
            }
            ApiError::Unprocessable(detail) => {
                warn!(%detail, "Rejected invalid query parameters");
                (StatusCode::UNPROCESSABLE_ENTITY, detail)
            }
            ApiError::Internal(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
