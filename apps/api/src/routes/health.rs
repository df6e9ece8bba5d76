use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

const DEFAULT_PROVIDER: &str = "Google Gemini";

/// GET /api/health
/// Reports liveness and whether AI analysis is available.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "ai_enabled": state.analyzer.is_configured(),
        "ai_provider": state.analyzer.provider_name().unwrap_or(DEFAULT_PROVIDER),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
