use anyhow::{Context, Result};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MAX_FILE_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_MAX_REQUEST_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration loaded from environment variables.
///
/// The Gemini credential is optional at startup: without it the service still
/// boots (so the health probe can report it), and every analysis request
/// fails with a configuration error instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Per-file upload cap.
    pub max_file_bytes: usize,
    /// Whole-request body cap, enforced by the router.
    pub max_request_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_file_bytes: parse_env("MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES)?,
            max_request_bytes: parse_env("MAX_REQUEST_BYTES", DEFAULT_MAX_REQUEST_BYTES)?,
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Treats an empty or whitespace-only value the same as an unset one.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
