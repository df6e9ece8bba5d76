use std::fmt::Display;

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::analyzer::AnalysisError;
use crate::analysis::models::{AnalysisRequest, ResumeUpload};
use crate::analysis::report::{MatchResponse, ResumeReport};
use crate::errors::AppError;
use crate::state::AppState;

const JOB_DESCRIPTION_FIELD: &str = "job_description";
const RESUMES_FIELD: &str = "resumes";
const FALLBACK_FILE_NAME: &str = "resume";

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Renders a byte limit the way the UI states it ("4MB", "512KB").
fn size_label(bytes: usize) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Fields pulled out of the multipart body, before validation.
struct MatchForm {
    job_description: String,
    resumes: Vec<ResumeUpload>,
}

fn form_error(e: impl Display) -> AppError {
    warn!("Form parse error: {e}");
    AppError::Validation("Failed to parse form data".to_string())
}

async fn read_form(multipart: &mut Multipart) -> Result<MatchForm, AppError> {
    let mut job_description = String::new();
    let mut resumes = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            JOB_DESCRIPTION_FIELD => {
                job_description = field.text().await.map_err(form_error)?;
            }
            RESUMES_FIELD => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(form_error)?;

                // Browsers send an empty part for an untouched file input.
                if file_name.as_deref().unwrap_or_default().is_empty() && bytes.is_empty() {
                    continue;
                }

                resumes.push(ResumeUpload {
                    file_name: file_name
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string()),
                    content_type,
                    bytes,
                });
            }
            other => debug!("Ignoring form field '{other}'"),
        }
    }

    Ok(MatchForm {
        job_description,
        resumes,
    })
}

/// POST /api/matcher
///
/// Answers 200 even when the analysis itself fails: the failure is reported
/// on the resume entry. Only a missing credential escalates to a 500.
pub async fn handle_match(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MatchResponse>, AppError> {
    if !state.analyzer.is_configured() {
        tracing::error!("GEMINI_API_KEY is not set; rejecting analysis request");
        return Err(AnalysisError::Configuration.into());
    }

    let mut multipart = multipart.map_err(form_error)?;
    let form = read_form(&mut multipart).await?;

    let job_description = form.job_description.trim().to_string();
    if job_description.is_empty() {
        return Err(AppError::Validation(
            "Please provide a job description".to_string(),
        ));
    }

    let mut resumes = form.resumes;
    let resume = match resumes.len() {
        0 => {
            return Err(AppError::Validation(
                "Please upload at least one resume".to_string(),
            ))
        }
        1 => resumes.remove(0),
        _ => {
            return Err(AppError::Validation(
                "Please upload only ONE resume at a time for AI analysis".to_string(),
            ))
        }
    };

    if resume.bytes.len() > state.config.max_file_bytes {
        return Err(AppError::Validation(format!(
            "Resume file exceeds the {} size limit",
            size_label(state.config.max_file_bytes)
        )));
    }

    let request_id = Uuid::new_v4();
    let filename = resume.file_name.clone();
    info!(
        %request_id,
        "Sending {filename} ({} bytes, declared {}) directly to AI analysis",
        resume.bytes.len(),
        resume.content_type.as_deref().unwrap_or("unknown")
    );

    let request = AnalysisRequest {
        job_description,
        resume,
    };

    let response = match state.analyzer.analyze(&request).await {
        Ok(analysis) => {
            info!(%request_id, "Analysis for {filename} served by {}", analysis.model_used);
            debug!(%request_id, attempts = ?analysis.attempts, "Model attempts");
            MatchResponse::completed(request.job_description, &analysis, filename)
        }
        Err(AnalysisError::Configuration) => return Err(AnalysisError::Configuration.into()),
        Err(e) => {
            tracing::error!(%request_id, "Error processing {filename}: {e}");
            let report = ResumeReport::failed(filename, &e);
            MatchResponse::failed(request.job_description, report)
        }
    };

    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct JobSkillsRequest {
    pub job_description: String,
}

#[derive(Serialize)]
pub struct JobSkillsResponse {
    pub skills: Vec<String>,
}

/// POST /api/job-skills
pub async fn handle_job_skills(
    State(state): State<AppState>,
    body: Result<Json<JobSkillsRequest>, JsonRejection>,
) -> Result<Json<JobSkillsResponse>, AppError> {
    let Json(req) = body.map_err(|e| {
        warn!("Job skills body rejected: {e}");
        AppError::Validation("Please provide a job description".to_string())
    })?;

    let job_description = req.job_description.trim();
    if job_description.is_empty() {
        return Err(AppError::Validation(
            "Please provide a job description".to_string(),
        ));
    }

    let skills = state.analyzer.extract_job_skills(job_description).await?;
    info!("Extracted {} skills from job description", skills.len());
    Ok(Json(JobSkillsResponse { skills }))
}
