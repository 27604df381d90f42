use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{db::StoreError, models::FilterError, services::union_query::QueryBuildError};

/// Body text for every 5xx; store detail is logged, never returned
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] FilterError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query build error: {0}")]
    QueryBuild(#[from] QueryBuildError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "Rejected request without filters");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::InvalidInput(msg) => {
                tracing::warn!(error = %msg, "Rejected malformed request body");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Store(_) | AppError::QueryBuild(_) => {
                tracing::error!(error = %self, "Error in geo recommendations endpoint");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
