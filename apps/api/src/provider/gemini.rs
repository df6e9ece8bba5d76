//! Google Gemini REST client: File API (upload / get / delete) and `generateContent`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    AiProvider, GenerationConfig, GenerationRequest, ProcessingState, ProviderError,
    UploadedArtifact,
};

const API_VERSION: &str = "v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_VERSION, path)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/{}/files", self.base_url, API_VERSION)
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "Google Gemini"
    }

    /// Resumable upload: a `start` call opens a session, then the bytes are
    /// sent in a single `upload, finalize` chunk.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedArtifact, ProviderError> {
        let bytes = tokio::fs::read(path).await?;

        let start = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: FileMetadata { display_name },
            })
            .send()
            .await?;
        let start = check_status(start).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(ProviderError::MissingUploadUrl)?;

        let response = self
            .client
            .post(&session_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let envelope: FileEnvelope = check_status(response).await?.json().await?;

        info!(
            "File uploaded to Gemini: {} ({})",
            envelope.file.display_name.as_deref().unwrap_or(display_name),
            envelope.file.uri
        );
        Ok(envelope.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<UploadedArtifact, ProviderError> {
        let response = self
            .client
            .get(self.api_url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let file: GeminiFile = check_status(response).await?.json().await?;
        Ok(file.into())
    }

    async fn delete_file(&self, name: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.api_url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ProviderError> {
        let body = GenerateContentRequest::from_request(&request);

        let response = self
            .client
            .post(self.api_url(&format!("models/{}:generateContent", request.model)))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response: GenerateContentResponse = check_status(response).await?.json().await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Gemini call succeeded: model={}, prompt_tokens={:?}, output_tokens={:?}",
                request.model, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        response.into_text()
    }
}

/// Passes 2xx responses through; everything else becomes `ProviderError::Api`
/// with the provider's own error message when the body carries one.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{status}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StartUploadRequest<'a> {
    file: FileMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct FileMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: FileState,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum FileState {
    Processing,
    Active,
    Failed,
    #[default]
    #[serde(other)]
    StateUnspecified,
}

impl From<FileState> for ProcessingState {
    fn from(state: FileState) -> Self {
        match state {
            FileState::Processing => ProcessingState::Processing,
            FileState::Active => ProcessingState::Ready,
            FileState::Failed => ProcessingState::Failed,
            FileState::StateUnspecified => ProcessingState::Pending,
        }
    }
}

impl From<GeminiFile> for UploadedArtifact {
    fn from(file: GeminiFile) -> Self {
        UploadedArtifact {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state: file.state.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a GenerationConfig>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a GenerationRequest<'a>) -> Self {
        let mut parts = vec![Part::Text {
            text: request.prompt,
        }];
        if let Some(file) = request.attachment {
            parts.push(Part::File {
                file_data: FileData {
                    mime_type: &file.mime_type,
                    file_uri: &file.uri,
                },
            });
        }
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: request.config.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    fn into_text(self) -> Result<String, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Blocked(reason));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        Ok(text)
    }
}
