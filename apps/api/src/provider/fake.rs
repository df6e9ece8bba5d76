//! Scripted in-memory provider for tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    AiProvider, GenerationConfig, GenerationRequest, ProcessingState, ProviderError,
    UploadedArtifact,
};

pub const FAKE_FILE_NAME: &str = "files/fake-resume";

/// What the fake saw when `upload_file` was called.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub model: String,
    pub prompt: String,
    pub file_uri: Option<String>,
    pub config: Option<GenerationConfig>,
}

#[derive(Default)]
pub struct FakeProvider {
    /// States returned by successive `get_file` calls; READY once exhausted.
    states: Mutex<VecDeque<ProcessingState>>,
    /// Replies returned by successive `generate` calls.
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fail_upload: bool,
    fail_delete: bool,
    pub uploads: Mutex<Vec<StagedUpload>>,
    pub polls: Mutex<u32>,
    pub generate_calls: Mutex<Vec<GenerateCall>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, states: impl IntoIterator<Item = ProcessingState>) -> Self {
        self.states.lock().unwrap().extend(states);
        self
    }

    pub fn with_reply(self, reply: Result<String, ProviderError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn generated_models(&self) -> Vec<String> {
        self.generate_calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.model.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap()
    }

    fn artifact(&self, state: ProcessingState, mime_type: &str) -> UploadedArtifact {
        UploadedArtifact {
            name: FAKE_FILE_NAME.to_string(),
            uri: format!("https://files.example.test/{FAKE_FILE_NAME}"),
            mime_type: mime_type.to_string(),
            state,
        }
    }
}

pub fn rate_limited() -> ProviderError {
    ProviderError::Api {
        status: 429,
        message: "RESOURCE_EXHAUSTED: Quota exceeded for this model".to_string(),
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::Api {
        status: 500,
        message: "INTERNAL: backend unavailable".to_string(),
    }
}

#[async_trait]
impl AiProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "Fake Provider"
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedArtifact, ProviderError> {
        let bytes = std::fs::read(path)?;
        self.uploads.lock().unwrap().push(StagedUpload {
            path: path.to_path_buf(),
            bytes,
            mime_type: mime_type.to_string(),
            display_name: display_name.to_string(),
        });
        if self.fail_upload {
            return Err(server_error());
        }
        Ok(self.artifact(ProcessingState::Processing, mime_type))
    }

    async fn get_file(&self, _name: &str) -> Result<UploadedArtifact, ProviderError> {
        *self.polls.lock().unwrap() += 1;
        let state = self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProcessingState::Ready);
        let mime_type = self
            .uploads
            .lock()
            .unwrap()
            .last()
            .map(|u| u.mime_type.clone())
            .unwrap_or_default();
        Ok(self.artifact(state, &mime_type))
    }

    async fn delete_file(&self, name: &str) -> Result<(), ProviderError> {
        if self.fail_delete {
            return Err(server_error());
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ProviderError> {
        self.generate_calls.lock().unwrap().push(GenerateCall {
            model: request.model.to_string(),
            prompt: request.prompt.to_string(),
            file_uri: request.attachment.map(|a| a.uri.clone()),
            config: request.config.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyContent))
    }
}
