/// LLM Client: the single point of entry for all model provider calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Embedding and generation both go through this client, which owns the
/// retry/backoff policy for transient upstream failures.
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod prompts;

const GENERATION_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True when the failure came from the per-attempt request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Http(e) if e.is_timeout())
    }
}

/// Bounded exponential backoff: `base`, `2 * base`, `4 * base`, ...
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `LLM_MAX_ATTEMPTS` counts every call, the first one included.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.llm_max_attempts.max(1),
            base_delay: config.llm_retry_base_delay,
        }
    }

    /// Delay to wait before the given attempt (0-indexed). The first attempt never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Rate limits and server-side failures are worth another attempt; other 4xx are not.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'a str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    response_mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseCandidate {
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single provider client used by the embedder and the reasoner.
/// Wraps the Gemini REST API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    generation_model: String,
    retry: RetryPolicy,
    /// Per-attempt timeouts. Each step's deadline is split evenly across its
    /// attempts so a hung attempt is retried before the deadline expires.
    embed_attempt_timeout: Duration,
    generate_attempt_timeout: Duration,
}

impl LlmClient {
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder().build()?;
        let retry = RetryPolicy::from_config(config);

        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            embed_attempt_timeout: config.embed_timeout / retry.max_attempts,
            generate_attempt_timeout: config.generate_timeout / retry.max_attempts,
            retry,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    /// Embeds one text. `task_type` is a Gemini task such as `RETRIEVAL_QUERY`.
    pub async fn embed_content(&self, text: &str, task_type: &str) -> Result<Vec<f32>, LlmError> {
        let request_body = EmbedContentRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::text(None, text),
            task_type,
        };

        let response: EmbedContentResponse = self
            .post(
                &self.embedding_model,
                "embedContent",
                &request_body,
                self.embed_attempt_timeout,
            )
            .await?;

        if response.embedding.values.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(response.embedding.values)
    }

    /// Runs one generation call in JSON mode and returns the raw text of the first candidate.
    pub async fn generate_content(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let request_body = GenerateContentRequest {
            system_instruction: Content::text(None, system),
            contents: vec![Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
                response_mime_type: "application/json",
            },
        };

        let response: GenerateContentResponse = self
            .post(
                &self.generation_model,
                "generateContent",
                &request_body,
                self.generate_attempt_timeout,
            )
            .await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Generation succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        response.text().ok_or(LlmError::EmptyContent)
    }

    /// POSTs to `{base}/models/{model}:{method}`, each attempt bounded by `attempt_timeout`.
    /// Retries on transport errors (timeouts included), 429 and 5xx with
    /// exponential backoff; the last error is returned once attempts run out.
    async fn post<B, T>(
        &self,
        model: &str,
        method: &str,
        body: &B,
        attempt_timeout: Duration,
    ) -> Result<T, LlmError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .timeout(attempt_timeout)
                .json(body)
                .send()
                .await;

            let error = match response {
                Err(e) => LlmError::Http(e),
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await?;
                        return serde_json::from_str(&text).map_err(LlmError::Parse);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) {
                        let message = serde_json::from_str::<GeminiError>(&text)
                            .map(|e| e.error.message)
                            .unwrap_or(text);
                        return Err(LlmError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    LlmError::Api {
                        status: status.as_u16(),
                        message: text,
                    }
                }
            };

            if attempt >= self.retry.max_attempts {
                warn!("{method} failed after {attempt} attempts: {error}");
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                "{method} attempt {attempt} failed ({error}), retrying after {}ms...",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
