/// Provider seam for the generative-AI backend.
///
/// The analyzer only talks to `AiProvider`; `GeminiClient` is the production
/// implementation and tests substitute an in-memory fake.
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[cfg(test)]
pub mod fake;
pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Upload session did not return an upload URL")]
    MissingUploadUrl,
}

impl ProviderError {
    /// HTTP status attached to the failure, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Processing state of a file held in the provider's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// Provider-side handle for an uploaded resume.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedArtifact {
    /// Resource name used for status checks and deletion (e.g. `files/abc123`).
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: ProcessingState,
}

/// Decoding settings sent with a generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<&'static str>,
}

impl GenerationConfig {
    /// Near-greedy decoding with JSON-constrained output.
    pub const fn deterministic_json() -> Self {
        GenerationConfig {
            temperature: 0.1,
            top_k: 20,
            top_p: 0.9,
            response_mime_type: Some("application/json"),
        }
    }
}

/// One generation call: a text prompt, optionally referencing an uploaded file.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub attachment: Option<&'a UploadedArtifact>,
    pub config: Option<GenerationConfig>,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Human-readable provider name, reported by the health probe.
    fn name(&self) -> &'static str;

    /// Uploads the file at `path`. The provider API reads from disk, not memory.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedArtifact, ProviderError>;

    async fn get_file(&self, name: &str) -> Result<UploadedArtifact, ProviderError>;

    async fn delete_file(&self, name: &str) -> Result<(), ProviderError>;

    /// Returns the raw text output of the model.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ProviderError>;
}
