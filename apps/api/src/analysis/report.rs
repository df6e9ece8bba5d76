//! Response body for `POST /api/matcher`.
//!
//! The flattened `matched_skills` / `missing_skills` lists are kept next to the
//! categorized breakdown so older UI builds keep rendering.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::analysis::analyzer::AnalysisError;
use crate::analysis::models::{Analysis, AnalysisResult};

const COMPLETE_MESSAGE: &str = "AI-powered ATS analysis complete";

/// Job-side skill lists, in the order they are flattened.
const JOB_SKILL_LISTS: [&str; 4] = [
    "technical_skills",
    "soft_skills",
    "tools_technologies",
    "certifications",
];

/// (matched key, missing key) per category in `matching_analysis`.
const TECHNICAL: (&str, &str) = ("matched_technical_skills", "missing_technical_skills");
const SOFT: (&str, &str) = ("matched_soft_skills", "missing_soft_skills");
const TOOLS: (&str, &str) = ("matched_tools", "missing_tools");
const CERTIFICATIONS: (&str, &str) = ("matched_certifications", "missing_certifications");

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub message: &'static str,
    pub relevant_skills: Vec<Value>,
    pub job_requirements: Option<Value>,
    pub job_description: String,
    pub top_resumes: Vec<ResumeReport>,
    pub analysis_powered_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResumeReport {
    pub filename: String,
    pub matched_skills: Vec<Value>,
    pub missing_skills: Vec<Value>,
    pub ats_score: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_scoring: Option<DetailedScoring>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_breakdown: Option<SkillsBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailedScoring {
    pub ats_score: Value,
    pub experience_match: Value,
    pub skill_proficiency: Value,
}

#[derive(Debug, Serialize)]
pub struct SkillsBreakdown {
    pub technical_skills: SkillSplit,
    pub soft_skills: SkillSplit,
    pub tools_and_technologies: SkillSplit,
    pub certifications: SkillSplit,
}

#[derive(Debug, Serialize)]
pub struct SkillSplit {
    pub matched: Vec<Value>,
    pub missing: Vec<Value>,
}

impl SkillSplit {
    fn from_result(result: &AnalysisResult, (matched, missing): (&str, &str)) -> Self {
        SkillSplit {
            matched: result.list("matching_analysis", matched),
            missing: result.list("matching_analysis", missing),
        }
    }
}

impl ResumeReport {
    pub fn from_analysis(filename: String, result: &AnalysisResult) -> Self {
        let breakdown = SkillsBreakdown {
            technical_skills: SkillSplit::from_result(result, TECHNICAL),
            soft_skills: SkillSplit::from_result(result, SOFT),
            tools_and_technologies: SkillSplit::from_result(result, TOOLS),
            certifications: SkillSplit::from_result(result, CERTIFICATIONS),
        };

        let splits = [
            &breakdown.technical_skills,
            &breakdown.soft_skills,
            &breakdown.tools_and_technologies,
            &breakdown.certifications,
        ];
        let matched_skills = splits.iter().flat_map(|s| s.matched.clone()).collect();
        let missing_skills = splits.iter().flat_map(|s| s.missing.clone()).collect();

        let scoring = result.section("scoring");
        ResumeReport {
            filename,
            matched_skills,
            missing_skills,
            ats_score: result.ats_score(),
            detailed_scoring: Some(DetailedScoring {
                ats_score: scoring["ats_score"].clone(),
                experience_match: scoring["experience_match"].clone(),
                skill_proficiency: scoring["skill_proficiency"].clone(),
            }),
            skills_breakdown: Some(breakdown),
            ai_insights: Some(result.section("ai_insights").clone()),
            recommendations: Some(result.section("recommendations").clone()),
            error: None,
        }
    }

    /// In-band failure entry: the request still answers 200.
    pub fn failed(filename: String, error: &AnalysisError) -> Self {
        ResumeReport {
            filename,
            matched_skills: Vec::new(),
            missing_skills: Vec::new(),
            ats_score: Number::from(0),
            detailed_scoring: None,
            skills_breakdown: None,
            ai_insights: None,
            recommendations: None,
            error: Some(format!("Failed to process file: {error}")),
        }
    }
}

impl MatchResponse {
    pub fn completed(job_description: String, analysis: &Analysis, filename: String) -> Self {
        let result = &analysis.result;
        MatchResponse {
            message: COMPLETE_MESSAGE,
            relevant_skills: JOB_SKILL_LISTS
                .iter()
                .flat_map(|key| result.list("job_skills", key))
                .collect(),
            job_requirements: Some(result.section("job_skills").clone()),
            job_description,
            top_resumes: vec![ResumeReport::from_analysis(filename, result)],
            analysis_powered_by: Some(analysis.model_used.clone()),
        }
    }

    pub fn failed(job_description: String, report: ResumeReport) -> Self {
        MatchResponse {
            message: COMPLETE_MESSAGE,
            relevant_skills: Vec::new(),
            job_requirements: None,
            job_description,
            top_resumes: vec![report],
            analysis_powered_by: None,
        }
    }
}
