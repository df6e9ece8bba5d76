use bytes::Bytes;
use serde::Serialize;
use serde_json::{Number, Value};

/// Top-level keys every analysis response must carry.
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "job_skills",
    "resume_skills",
    "matching_analysis",
    "scoring",
    "ai_insights",
    "recommendations",
];

/// A resume file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    /// Content type declared by the browser. Informational only: the MIME
    /// type sent to the provider is inferred from the file name.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub job_description: String,
    pub resume: ResumeUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Success,
    RateLimited,
    OtherError,
}

/// One entry of the model fallback chain as it was actually tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAttempt {
    pub model: String,
    /// 0-based position in the fallback chain.
    pub position: usize,
    pub status: AttemptStatus,
}

/// Model output that passed structural validation. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult(Value);

impl AnalysisResult {
    /// Only the normalizer constructs results, after validating the shape.
    pub(crate) fn new_validated(value: Value) -> Self {
        AnalysisResult(value)
    }

    #[cfg(test)]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn section(&self, name: &str) -> &Value {
        &self.0[name]
    }

    /// `scoring.ats_score.value`; numeric by construction.
    pub fn ats_score(&self) -> Number {
        match &self.0["scoring"]["ats_score"]["value"] {
            Value::Number(n) => n.clone(),
            _ => Number::from(0),
        }
    }

    /// String list under `section.key`; an absent or non-array field reads as empty.
    pub fn list(&self, section: &str, key: &str) -> Vec<Value> {
        self.0[section][key].as_array().cloned().unwrap_or_default()
    }
}

/// Successful orchestrator output.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub model_used: String,
    pub attempts: Vec<ModelAttempt>,
}
