use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::analyzer::AnalysisError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::Analysis(e) => match e {
                AnalysisError::Configuration => "CONFIGURATION_ERROR",
                AnalysisError::AllModelsRateLimited => "RATE_LIMITED",
                AnalysisError::InvalidResponseFormat(_) => "INVALID_AI_RESPONSE",
                AnalysisError::UploadProcessing => "UPLOAD_PROCESSING_ERROR",
                AnalysisError::Staging(_) | AnalysisError::Provider(_) => "AI_ERROR",
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
            }
            AppError::Analysis(e) => {
                tracing::error!("Analysis error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        // Flat shape: the UI reads `error` as a plain string.
        let body = Json(json!({
            "error": message,
            "code": self.code()
        }));

        (status, body).into_response()
    }
}
