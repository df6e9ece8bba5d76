//! Remote analysis orchestrator.
//!
//! One call runs strictly in sequence: stage + upload the resume, poll until the
//! provider has processed it, walk the model fallback chain, normalize the
//! winning output, then delete the uploaded file. The staged local copy and the
//! provider-side file are released independently.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::models::{Analysis, AnalysisRequest, AttemptStatus, ModelAttempt};
use crate::analysis::normalizer::{normalize, normalize_skill_list, NormalizeError};
use crate::analysis::prompts::{build_analysis_prompt, build_job_skills_prompt};
use crate::provider::{
    AiProvider, GenerationConfig, GenerationRequest, ProcessingState, ProviderError,
    UploadedArtifact,
};

/// Highest capability first; later entries are cheaper fallbacks.
pub const MODEL_FALLBACK_CHAIN: [&str; 3] = [
    "gemini-3-flash-preview",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
];

/// Model used for the lightweight job-skill extraction.
pub const JOB_SKILLS_MODEL: &str = "gemini-2.5-flash";

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLL_ATTEMPTS: u32 = 10;

const RATE_LIMIT_MARKERS: [&str; 4] = ["rate limit", "quota", "resource_exhausted", "429"];

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const DOC_MIME: &str = "application/msword";
pub const TXT_MIME: &str = "text/plain";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Server configuration error: GEMINI_API_KEY not configured")]
    Configuration,

    #[error("Failed to stage resume for upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error("File processing failed in Gemini API")]
    UploadProcessing,

    #[error("All available models are rate limited. Please try again in a few minutes.")]
    AllModelsRateLimited,

    #[error("AI returned invalid response format. Please try again. ({0})")]
    InvalidResponseFormat(#[from] NormalizeError),

    #[error("AI analysis failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Maps a file name to the MIME type declared to the provider. PDF is the catch-all.
pub fn infer_mime_type(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".docx") {
        DOCX_MIME
    } else if lower.ends_with(".doc") {
        DOC_MIME
    } else if lower.ends_with(".txt") {
        TXT_MIME
    } else {
        PDF_MIME
    }
}

/// Throttling is an HTTP 429 or a message mentioning rate limits or quota.
pub fn is_rate_limit_error(err: &ProviderError) -> bool {
    if err.status() == Some(429) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Result of a single model in the fallback chain.
enum AttemptOutcome {
    Success(String),
    RateLimited(ProviderError),
    Fatal(ProviderError),
}

impl AttemptOutcome {
    fn status(&self) -> AttemptStatus {
        match self {
            AttemptOutcome::Success(_) => AttemptStatus::Success,
            AttemptOutcome::RateLimited(_) => AttemptStatus::RateLimited,
            AttemptOutcome::Fatal(_) => AttemptStatus::OtherError,
        }
    }
}

/// Raw model output plus the trail of attempts that produced it.
struct Generation {
    text: String,
    model_used: String,
    attempts: Vec<ModelAttempt>,
}

/// Entry point for resume analysis. Holds the provider explicitly so callers
/// (and tests) decide which backend is used; `None` means no credential.
#[derive(Clone)]
pub struct ResumeAnalyzer {
    provider: Option<Arc<dyn AiProvider>>,
}

impl ResumeAnalyzer {
    pub fn new(provider: Option<Arc<dyn AiProvider>>) -> Self {
        Self { provider }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    fn provider(&self) -> Result<Arc<dyn AiProvider>, AnalysisError> {
        self.provider.clone().ok_or(AnalysisError::Configuration)
    }

    /// Analyzes one resume against a job description.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalysisError> {
        let provider = self.provider()?;
        let resume = &request.resume;
        let mime_type = infer_mime_type(&resume.file_name);

        info!(
            "Uploading {} ({mime_type}) to {}...",
            resume.file_name,
            provider.name()
        );
        let artifact =
            upload_staged(provider.as_ref(), resume.bytes.clone(), mime_type, &resume.file_name)
                .await?;
        let guard = ArtifactGuard::new(Arc::clone(&provider), artifact.name.clone());

        let outcome = run_analysis(provider.as_ref(), &artifact, &request.job_description).await;

        guard.release().await;
        outcome
    }

    /// Extracts a flat skill list from a job description, without a resume.
    pub async fn extract_job_skills(
        &self,
        job_description: &str,
    ) -> Result<Vec<String>, AnalysisError> {
        let provider = self.provider()?;
        let prompt = build_job_skills_prompt(job_description);

        let raw = provider
            .generate(GenerationRequest {
                model: JOB_SKILLS_MODEL,
                prompt: &prompt,
                attachment: None,
                config: None,
            })
            .await?;

        Ok(normalize_skill_list(&raw)?)
    }
}

async fn run_analysis(
    provider: &dyn AiProvider,
    artifact: &UploadedArtifact,
    job_description: &str,
) -> Result<Analysis, AnalysisError> {
    wait_until_ready(provider, artifact).await?;

    let prompt = build_analysis_prompt(job_description);
    let generation = generate_with_fallback(provider, &prompt, artifact).await?;

    info!(
        "Received AI response from {}, parsing JSON...",
        generation.model_used
    );
    let result = normalize(&generation.text)?;
    info!(
        "AI analysis completed successfully using {}",
        generation.model_used
    );

    Ok(Analysis {
        result,
        model_used: generation.model_used,
        attempts: generation.attempts,
    })
}

/// Writes the payload to a uniquely named temp file, uploads it by path, and
/// removes the temp file as soon as the upload call returns.
async fn upload_staged(
    provider: &dyn AiProvider,
    bytes: Bytes,
    mime_type: &str,
    display_name: &str,
) -> Result<UploadedArtifact, AnalysisError> {
    // File writes block; keep them off the async workers.
    let staged = tokio::task::spawn_blocking(move || stage_file(&bytes))
        .await
        .map_err(std::io::Error::other)
        .and_then(|staged| staged)
        .map_err(AnalysisError::Staging)?;

    let uploaded = provider
        .upload_file(staged.path(), mime_type, display_name)
        .await;

    if let Err(e) = staged.close() {
        warn!("Failed to remove staged upload: {e}");
    }

    Ok(uploaded?)
}

fn stage_file(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("resume-{}-", Utc::now().timestamp_micros()))
        .suffix(".tmp")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Polls while the file is PROCESSING, up to `MAX_POLL_ATTEMPTS` waits.
/// Running out of attempts is not an error: generation is attempted anyway.
async fn wait_until_ready(
    provider: &dyn AiProvider,
    artifact: &UploadedArtifact,
) -> Result<(), AnalysisError> {
    let mut state = provider.get_file(&artifact.name).await?.state;
    let mut waits = 0;

    while state == ProcessingState::Processing && waits < MAX_POLL_ATTEMPTS {
        debug!("Waiting for file processing...");
        tokio::time::sleep(POLL_INTERVAL).await;
        state = provider.get_file(&artifact.name).await?.state;
        waits += 1;
    }

    match state {
        ProcessingState::Failed => Err(AnalysisError::UploadProcessing),
        ProcessingState::Processing => {
            warn!(
                "File {} still processing after {waits} checks; proceeding with generation",
                artifact.name
            );
            Ok(())
        }
        _ => {
            info!("File ready for analysis");
            Ok(())
        }
    }
}

/// Walks `MODEL_FALLBACK_CHAIN` in order. Stops at the first success or the
/// first non-throttling failure; only an all-throttled chain exhausts.
async fn generate_with_fallback(
    provider: &dyn AiProvider,
    prompt: &str,
    artifact: &UploadedArtifact,
) -> Result<Generation, AnalysisError> {
    let mut attempts = Vec::with_capacity(MODEL_FALLBACK_CHAIN.len());

    for (position, model) in MODEL_FALLBACK_CHAIN.iter().enumerate() {
        info!("Attempting analysis with {model}...");
        let outcome = attempt_model(provider, model, prompt, artifact).await;

        attempts.push(ModelAttempt {
            model: model.to_string(),
            position,
            status: outcome.status(),
        });

        match outcome {
            AttemptOutcome::Success(text) => {
                info!("Successfully analyzed with {model}");
                return Ok(Generation {
                    text,
                    model_used: model.to_string(),
                    attempts,
                });
            }
            AttemptOutcome::RateLimited(e) => {
                warn!("Rate limit hit on {model}, trying next model: {e}");
            }
            AttemptOutcome::Fatal(e) => {
                tracing::error!("Error with {model}: {e}");
                return Err(AnalysisError::Provider(e));
            }
        }
    }

    tracing::error!("All models exhausted due to rate limits");
    Err(AnalysisError::AllModelsRateLimited)
}

async fn attempt_model(
    provider: &dyn AiProvider,
    model: &str,
    prompt: &str,
    artifact: &UploadedArtifact,
) -> AttemptOutcome {
    let request = GenerationRequest {
        model,
        prompt,
        attachment: Some(artifact),
        config: Some(GenerationConfig::deterministic_json()),
    };

    match provider.generate(request).await {
        Ok(text) => AttemptOutcome::Success(text),
        Err(e) if is_rate_limit_error(&e) => AttemptOutcome::RateLimited(e),
        Err(e) => AttemptOutcome::Fatal(e),
    }
}

/// Owns the provider-side file for one analysis. `release` deletes it inline;
/// if the guard is dropped without release (the request future was cancelled)
/// the delete is spawned onto the runtime instead.
struct ArtifactGuard {
    provider: Arc<dyn AiProvider>,
    name: Option<String>,
}

impl ArtifactGuard {
    fn new(provider: Arc<dyn AiProvider>, name: String) -> Self {
        Self {
            provider,
            name: Some(name),
        }
    }

    async fn release(mut self) {
        if let Some(name) = self.name.take() {
            delete_quietly(self.provider.as_ref(), &name).await;
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let provider = Arc::clone(&self.provider);
                handle.spawn(async move {
                    delete_quietly(provider.as_ref(), &name).await;
                });
            }
            Err(_) => warn!("No runtime available to delete uploaded file {name}"),
        }
    }
}

/// Cleanup never fails the caller.
async fn delete_quietly(provider: &dyn AiProvider, name: &str) {
    match provider.delete_file(name).await {
        Ok(()) => info!("Cleaned up uploaded file {name}"),
        Err(e) => warn!("Failed to delete uploaded file {name}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::ResumeUpload;
    use crate::analysis::normalizer::tests::valid_response;
    use crate::provider::fake::{rate_limited, server_error, FakeProvider, FAKE_FILE_NAME};
    use bytes::Bytes;

    const JD: &str = "Senior Rust Engineer. Required: Rust, SQL, Docker, AWS certification.";

    fn request(file_name: &str) -> AnalysisRequest {
        AnalysisRequest {
            job_description: JD.to_string(),
            resume: ResumeUpload {
                file_name: file_name.to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: Bytes::from_static(b"%PDF-1.4 resume body"),
            },
        }
    }

    fn analyzer(fake: &Arc<FakeProvider>) -> ResumeAnalyzer {
        let provider: Arc<dyn AiProvider> = fake.clone();
        ResumeAnalyzer::new(Some(provider))
    }

    fn ok_reply() -> Result<String, ProviderError> {
        Ok(valid_response().to_string())
    }

    #[test]
    fn test_infer_mime_type_by_extension() {
        assert_eq!(infer_mime_type("cv.docx"), DOCX_MIME);
        assert_eq!(infer_mime_type("CV.DOCX"), DOCX_MIME);
        assert_eq!(infer_mime_type("old-resume.doc"), DOC_MIME);
        assert_eq!(infer_mime_type("resume.txt"), TXT_MIME);
        assert_eq!(infer_mime_type("resume.pdf"), PDF_MIME);
    }

    #[test]
    fn test_infer_mime_type_defaults_to_pdf() {
        for name in ["resume", "resume.rtf", "resume.docx.zip", "", ".txt.png"] {
            assert_eq!(infer_mime_type(name), PDF_MIME, "{name}");
        }
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit_error(&ProviderError::Api {
            status: 429,
            message: "slow down".to_string(),
        }));
        assert!(is_rate_limit_error(&ProviderError::Api {
            status: 400,
            message: "Rate Limit reached for requests".to_string(),
        }));
        assert!(is_rate_limit_error(&ProviderError::Api {
            status: 403,
            message: "Quota exceeded".to_string(),
        }));
        assert!(is_rate_limit_error(&ProviderError::Api {
            status: 503,
            message: "RESOURCE_EXHAUSTED".to_string(),
        }));
        assert!(is_rate_limit_error(&ProviderError::Blocked(
            "upstream said 429".to_string()
        )));
        assert!(!is_rate_limit_error(&server_error()));
        assert!(!is_rate_limit_error(&ProviderError::EmptyContent));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_call() {
        let analyzer = ResumeAnalyzer::new(None);
        assert!(!analyzer.is_configured());
        let err = analyzer.analyze(&request("resume.pdf")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration));
        assert_eq!(
            err.to_string(),
            "Server configuration error: GEMINI_API_KEY not configured"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_model_success() {
        let fake = Arc::new(FakeProvider::new().with_reply(ok_reply()));
        let analysis = analyzer(&fake).analyze(&request("resume.docx")).await.unwrap();

        assert_eq!(analysis.model_used, MODEL_FALLBACK_CHAIN[0]);
        assert_eq!(analysis.attempts.len(), 1);
        assert_eq!(analysis.attempts[0].status, AttemptStatus::Success);
        assert_eq!(analysis.result.as_value(), &valid_response());

        let uploads = fake.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes, b"%PDF-1.4 resume body");
        assert_eq!(uploads[0].mime_type, DOCX_MIME);
        assert_eq!(uploads[0].display_name, "resume.docx");

        let calls = fake.generate_calls.lock().unwrap().clone();
        assert_eq!(calls[0].prompt, build_analysis_prompt(JD));
        assert!(calls[0].file_uri.as_deref().unwrap().ends_with(FAKE_FILE_NAME));
        assert_eq!(calls[0].config, Some(GenerationConfig::deterministic_json()));

        assert_eq!(fake.deleted(), vec![FAKE_FILE_NAME.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_file_is_uniquely_named_and_removed() {
        let fake = Arc::new(FakeProvider::new().with_reply(ok_reply()));
        analyzer(&fake).analyze(&request("resume.pdf")).await.unwrap();

        let uploads = fake.uploads.lock().unwrap().clone();
        let path = &uploads[0].path;
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("resume-"));
        assert!(file_name.ends_with(".tmp"));
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_third_model_after_two_rate_limits() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_reply(Err(rate_limited()))
                .with_reply(Err(rate_limited()))
                .with_reply(ok_reply()),
        );
        let analysis = analyzer(&fake).analyze(&request("resume.pdf")).await.unwrap();

        assert_eq!(analysis.model_used, MODEL_FALLBACK_CHAIN[2]);
        let statuses: Vec<_> = analysis.attempts.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                AttemptStatus::RateLimited,
                AttemptStatus::RateLimited,
                AttemptStatus::Success
            ]
        );
        let positions: Vec<_> = analysis.attempts.iter().map(|a| a.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(fake.generated_models(), MODEL_FALLBACK_CHAIN.to_vec());
        assert_eq!(fake.deleted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_models_rate_limited() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_reply(Err(rate_limited()))
                .with_reply(Err(rate_limited()))
                .with_reply(Err(rate_limited())),
        );
        let err = analyzer(&fake)
            .analyze(&request("resume.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::AllModelsRateLimited));
        assert_eq!(fake.generated_models().len(), 3);
        assert_eq!(fake.deleted(), vec![FAKE_FILE_NAME.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_error_stops_the_chain() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_reply(Err(server_error()))
                .with_reply(ok_reply()),
        );
        let err = analyzer(&fake)
            .analyze(&request("resume.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Provider(ProviderError::Api { status: 500, .. })));
        assert_eq!(fake.generated_models(), vec![MODEL_FALLBACK_CHAIN[0].to_string()]);
        assert_eq!(fake.deleted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_processing_skips_generation() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_states([ProcessingState::Processing, ProcessingState::Failed])
                .with_reply(ok_reply()),
        );
        let err = analyzer(&fake)
            .analyze(&request("resume.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::UploadProcessing));
        assert!(fake.generated_models().is_empty());
        assert_eq!(fake.deleted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_states([
                    ProcessingState::Processing,
                    ProcessingState::Processing,
                    ProcessingState::Processing,
                    ProcessingState::Ready,
                ])
                .with_reply(ok_reply()),
        );
        let started = tokio::time::Instant::now();
        analyzer(&fake).analyze(&request("resume.pdf")).await.unwrap();

        assert_eq!(fake.poll_count(), 4);
        assert!(started.elapsed() >= POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_bound_is_a_soft_timeout() {
        let fake = Arc::new(
            FakeProvider::new()
                .with_states(std::iter::repeat(ProcessingState::Processing).take(50))
                .with_reply(ok_reply()),
        );
        let started = tokio::time::Instant::now();
        let analysis = analyzer(&fake).analyze(&request("resume.pdf")).await.unwrap();

        // One initial check plus one per wait.
        assert_eq!(fake.poll_count(), MAX_POLL_ATTEMPTS + 1);
        assert!(started.elapsed() >= POLL_INTERVAL * MAX_POLL_ATTEMPTS);
        assert_eq!(analysis.model_used, MODEL_FALLBACK_CHAIN[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_output_is_invalid_format_and_still_cleans_up() {
        let fake = Arc::new(
            FakeProvider::new().with_reply(Ok("Sorry, I cannot help with that.".to_string())),
        );
        let err = analyzer(&fake)
            .analyze(&request("resume.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::InvalidResponseFormat(NormalizeError::Parse { .. })
        ));
        assert_eq!(fake.generated_models().len(), 1);
        assert_eq!(fake.deleted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failure_does_not_mask_result() {
        let fake = Arc::new(FakeProvider::new().with_reply(ok_reply()).failing_delete());
        let analysis = analyzer(&fake).analyze(&request("resume.pdf")).await.unwrap();
        assert_eq!(analysis.model_used, MODEL_FALLBACK_CHAIN[0]);
        assert!(fake.deleted().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_large_resume_is_staged_intact_on_multi_thread_runtime() {
        let payload = Bytes::from(vec![b'r'; 4 * 1024 * 1024]);
        let fake = Arc::new(FakeProvider::new().with_reply(ok_reply()));
        let mut req = request("resume.pdf");
        req.resume.bytes = payload.clone();

        analyzer(&fake).analyze(&req).await.unwrap();

        let uploads = fake.uploads.lock().unwrap().clone();
        assert_eq!(uploads[0].bytes.len(), payload.len());
        assert_eq!(uploads[0].bytes, payload.to_vec());
        assert!(!uploads[0].path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_failure_removes_staged_file_and_skips_delete() {
        let fake = Arc::new(FakeProvider::new().failing_upload());
        let err = analyzer(&fake)
            .analyze(&request("resume.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Provider(_)));
        let uploads = fake.uploads.lock().unwrap().clone();
        assert!(!uploads[0].path.exists());
        assert_eq!(fake.poll_count(), 0);
        assert!(fake.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_guard_schedules_delete() {
        let fake = Arc::new(FakeProvider::new());
        let provider: Arc<dyn AiProvider> = fake.clone();
        drop(ArtifactGuard::new(provider, FAKE_FILE_NAME.to_string()));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fake.deleted(), vec![FAKE_FILE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_extract_job_skills_uses_single_model_without_attachment() {
        let fake = Arc::new(
            FakeProvider::new().with_reply(Ok("```json\n[\"Rust\", \"SQL\"]\n```".to_string())),
        );
        let skills = analyzer(&fake).extract_job_skills(JD).await.unwrap();

        assert_eq!(skills, vec!["Rust".to_string(), "SQL".to_string()]);
        let calls = fake.generate_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, JOB_SKILLS_MODEL);
        assert!(calls[0].file_uri.is_none());
        assert!(calls[0].config.is_none());
        assert!(fake.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_job_skills_requires_credential() {
        let err = ResumeAnalyzer::new(None)
            .extract_job_skills(JD)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration));
    }
}
