//! Embedder: converts text into fixed-length vectors.
//!
//! The provider is reached through [`Embedder`], carried in `AppState` as
//! `Arc<dyn Embedder>`. [`cache::CachedEmbedder`] memoizes document embeddings
//! so taxonomy text is embedded once per process (and once per index file).

use async_trait::async_trait;
use thiserror::Error;

use crate::llm_client::{LlmClient, LlmError};

pub mod cache;

/// Which side of the retrieval a text is on. Providers embed the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    /// Taxonomy text that gets indexed.
    Document,
    /// A user description being classified.
    Query,
}

impl EmbedTask {
    pub fn as_gemini_task(self) -> &'static str {
        match self {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding provider failed: {0}")]
    Upstream(String),

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding provider returned a malformed vector: {0}")]
    Malformed(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<LlmError> for EmbeddingError {
    fn from(err: LlmError) -> Self {
        if err.is_timeout() {
            return EmbeddingError::Timeout;
        }
        match err {
            LlmError::EmptyContent => EmbeddingError::Malformed("empty vector".to_string()),
            LlmError::Parse(e) => EmbeddingError::Malformed(e.to_string()),
            other => EmbeddingError::Upstream(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let vector = self.embed_content(text, task.as_gemini_task()).await?;
        check_vector(&vector)?;
        Ok(vector)
    }
}

/// Rejects empty vectors and vectors carrying NaN or infinities.
pub fn check_vector(vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::Malformed("empty vector".to_string()));
    }
    if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::Malformed(format!(
            "non-finite value at index {pos}"
        )));
    }
    Ok(())
}
