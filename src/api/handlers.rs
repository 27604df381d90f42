use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{FilterRequest, Recommendation},
    services::recommendations,
};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Geo recommendations endpoint
///
/// Accepts a JSON object with any of `country`, `city` and `region` and returns the
/// matching games, micro-apps and cards as a JSON array (possibly empty).
pub async fn geo_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> AppResult<Json<Vec<Recommendation>>> {
    tracing::info!(request_id = %request_id, "Geo recommendations endpoint called");

    let Json(request) = payload.map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

    // The deadline starts when the request is accepted, not when the snapshot opens
    let deadline = state.request_timeout.map(|timeout| Instant::now() + timeout);

    let recommendations =
        recommendations::recommend(state.store.as_ref(), request, deadline).await?;

    tracing::info!(
        request_id = %request_id,
        count = recommendations.len(),
        "Geo recommendations request completed"
    );

    Ok(Json(recommendations))
}
