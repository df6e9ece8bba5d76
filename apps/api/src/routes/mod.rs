pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::errors::AppError;
use crate::state::AppState;

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .route(
            "/api/health",
            get(health::health_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/matcher",
            post(handlers::handle_match).fallback(method_not_allowed),
        )
        .route(
            "/api/job-skills",
            post(handlers::handle_job_skills).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
