use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_INDEX_PATH: &str = "data/taxonomy_index.json";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://frontend:3000,http://127.0.0.1:3000";
const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

pub const DEFAULT_FALLBACK_REASON: &str =
    "Selected based on the closest semantic match in the occupation taxonomy.";

/// Application configuration loaded from environment variables.
/// Startup fails if the provider key is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub api_base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    /// JSON taxonomy source. `None` serves the built-in sample taxonomy.
    pub taxonomy_path: Option<PathBuf>,
    pub taxonomy_index_path: PathBuf,
    pub candidate_count: usize,
    pub max_input_chars: usize,
    pub embed_timeout: Duration,
    pub generate_timeout: Duration,
    /// Total calls per upstream request, the first one included.
    pub llm_max_attempts: u32,
    pub llm_retry_base_delay: Duration,
    pub fallback_enabled: bool,
    pub fallback_reason: String,
    pub cors_allowed_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let gemini_api_key = require_env("GEMINI_API_KEY")?;
        if gemini_api_key == PLACEHOLDER_API_KEY {
            bail!("GEMINI_API_KEY still holds the placeholder value; set a real key");
        }

        let candidate_count: usize = parse_env("CANDIDATE_COUNT", 5)?;
        if candidate_count == 0 {
            bail!("CANDIDATE_COUNT must be at least 1");
        }

        Ok(Config {
            gemini_api_key,
            api_base_url: env_or("GEMINI_API_BASE_URL", DEFAULT_API_BASE_URL),
            embedding_model: env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            generation_model: env_or("GENERATION_MODEL", DEFAULT_GENERATION_MODEL),
            taxonomy_path: std::env::var("TAXONOMY_PATH").ok().map(PathBuf::from),
            taxonomy_index_path: PathBuf::from(env_or("TAXONOMY_INDEX_PATH", DEFAULT_INDEX_PATH)),
            candidate_count,
            max_input_chars: parse_env("MAX_INPUT_CHARS", 500)?,
            embed_timeout: Duration::from_secs(parse_env("EMBED_TIMEOUT_SECS", 30)?),
            generate_timeout: Duration::from_secs(parse_env("GENERATE_TIMEOUT_SECS", 60)?),
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 3)?,
            llm_retry_base_delay: Duration::from_millis(parse_env("LLM_RETRY_BASE_DELAY_MS", 1000)?),
            fallback_enabled: parse_env("REASONER_FALLBACK_ENABLED", true)?,
            fallback_reason: env_or("REASONER_FALLBACK_REASON", DEFAULT_FALLBACK_REASON),
            cors_allowed_origins: split_origins(&env_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)),
            port: parse_env("PORT", 8000)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
