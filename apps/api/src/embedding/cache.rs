//! In-memory memo cache for document embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use moka::sync::Cache;
use tracing::debug;

use super::{EmbedTask, Embedder, EmbeddingError};

/// Wraps an [`Embedder`] and remembers document embeddings by text.
///
/// Query embeddings pass straight through: user input is not reused across
/// requests, taxonomy text is.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    documents: Cache<String, Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    const DEFAULT_CAPACITY: u64 = 10_000;

    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn Embedder>, capacity: u64) -> Self {
        Self {
            inner,
            documents: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Preloads a known document embedding (e.g. from a persisted index).
    pub fn seed(&self, text: &str, vector: Vec<f32>) {
        self.documents.insert(text.to_string(), Arc::new(vector));
    }

    #[cfg(test)]
    pub fn cached(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        self.documents.get(text)
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, EmbeddingError> {
        if task == EmbedTask::Query {
            return self.inner.embed(text, task).await;
        }

        if let Some(hit) = self.documents.get(text) {
            debug!("document embedding cache hit");
            return Ok(hit.as_ref().clone());
        }

        let vector = self.inner.embed(text, task).await?;
        self.documents
            .insert(text.to_string(), Arc::new(vector.clone()));
        Ok(vector)
    }
}
