//! Response normalizer: coerces free-form model output into a validated `AnalysisResult`.
//!
//! Cleaning is a best-effort repair pipeline kept separate from parsing:
//! trim → strip code fences → keep the outermost `{...}` → flatten newline/tab
//! sequences → collapse whitespace. Validation is structural only; score ranges
//! and list contents are taken as the model produced them.

use serde_json::Value;
use thiserror::Error;

use crate::analysis::models::{AnalysisResult, REQUIRED_SECTIONS};

const HEAD_SNIPPET_CHARS: usize = 500;
const TAIL_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to parse AI response: {message}")]
    Parse {
        message: String,
        /// First characters of the cleaned text, for diagnostics.
        head: String,
        /// Last characters of the cleaned text, for diagnostics.
        tail: String,
    },

    #[error("Invalid AI response: missing '{0}' field")]
    MissingField(String),

    #[error("Invalid AI response: '{0}' must be a number")]
    InvalidField(String),

    #[error("Invalid AI response: expected a JSON object")]
    NotAnObject,
}

/// Cleans, parses and validates raw model text.
pub fn normalize(raw: &str) -> Result<AnalysisResult, NormalizeError> {
    let cleaned = clean_response(raw);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        let head = head_snippet(&cleaned);
        let tail = tail_snippet(&cleaned);
        tracing::error!("JSON parse error: {e}");
        tracing::error!("Problematic JSON snippet: {head}");
        tracing::error!("JSON end snippet: {tail}");
        NormalizeError::Parse {
            message: e.to_string(),
            head,
            tail,
        }
    })?;

    validate(&value)?;
    Ok(AnalysisResult::new_validated(value))
}

/// Parses a fenced or bare JSON array of skill names.
pub fn normalize_skill_list(raw: &str) -> Result<Vec<String>, NormalizeError> {
    let text = strip_code_fences(raw);
    serde_json::from_str(text).map_err(|e| NormalizeError::Parse {
        message: e.to_string(),
        head: head_snippet(text),
        tail: tail_snippet(text),
    })
}

/// Pure text repair applied before parsing.
pub fn clean_response(raw: &str) -> String {
    let text = strip_code_fences(raw);
    let text = extract_outer_object(text);
    collapse_whitespace(&flatten_control_sequences(text))
}

/// Strips ```` ```json ... ``` ```` or ```` ``` ... ``` ```` wrappers.
/// The language tag is whatever sits on the opening fence line.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    let body = match rest.split_once('\n') {
        Some((tag, body)) if is_fence_tag(tag) => body,
        _ => rest.strip_prefix("json").unwrap_or(rest),
    };

    let body = body.trim();
    body.strip_suffix("```").map(str::trim_end).unwrap_or(body)
}

fn is_fence_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Greedy match: first `{` through last `}`. Text without a brace pair is returned as-is.
fn extract_outer_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Replaces `\n` / `\t` escape sequences and raw newline, carriage-return and
/// tab characters with a space. Escaped backslashes (`\\`) are copied as a pair
/// so `\\n` stays a backslash followed by `n`.
fn flatten_control_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('n') | Some('t') => {
                    chars.next();
                    out.push(' ');
                }
                Some(_) => {
                    out.push(c);
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                None => out.push(c),
            },
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn head_snippet(text: &str) -> String {
    text.chars().take(HEAD_SNIPPET_CHARS).collect()
}

fn tail_snippet(text: &str) -> String {
    let len = text.chars().count();
    text.chars()
        .skip(len.saturating_sub(TAIL_SNIPPET_CHARS))
        .collect()
}

fn validate(value: &Value) -> Result<(), NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::NotAnObject);
    }

    for section in REQUIRED_SECTIONS {
        if value[section].is_null() {
            return Err(NormalizeError::MissingField(section.to_string()));
        }
    }

    if !value["scoring"]["ats_score"]["value"].is_number() {
        return Err(NormalizeError::InvalidField(
            "scoring.ats_score.value".to_string(),
        ));
    }

    if value["ai_insights"]["experience_gap_analysis"].is_null() {
        return Err(NormalizeError::MissingField(
            "ai_insights.experience_gap_analysis".to_string(),
        ));
    }

    if value["recommendations"]["skills_to_add"].is_null() {
        return Err(NormalizeError::MissingField(
            "recommendations.skills_to_add".to_string(),
        ));
    }

    Ok(())
}
