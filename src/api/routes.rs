use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Path kept from the original service so existing clients keep working
pub const RECOMMENDATIONS_PATH: &str = "/pwa_recommendations_endpoint";

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(RECOMMENDATIONS_PATH, post(handlers::geo_recommendations))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
