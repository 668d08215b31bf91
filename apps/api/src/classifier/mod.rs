//! Classification Service: Embedder → Retriever → Reasoner.
//!
//! A single linear pipeline per request. The only shared state it touches is
//! the taxonomy snapshot, loaded once at the start of the request, so a
//! concurrent reload never changes the corpus halfway through a ranking.
//! Retries live in the provider client; this layer only bounds each provider
//! step with a deadline.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::config::Config;
use crate::embedding::{EmbedTask, Embedder, EmbeddingError};
use crate::errors::AppError;
use crate::reasoning::Reasoner;
use crate::retrieval::{rank, Candidate};
use crate::taxonomy::TaxonomyStore;

pub mod handlers;

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRequest {
    pub user_input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub code: String,
    pub name: String,
    pub reason: String,
    pub candidates: Vec<Candidate>,
    pub user_input: String,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub candidate_count: usize,
    pub max_input_chars: usize,
    pub embed_timeout: Duration,
    pub generate_timeout: Duration,
    /// Reason returned when generation fails. `None` turns such failures into errors.
    pub fallback_reason: Option<String>,
}

impl ClassifierSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            candidate_count: config.candidate_count,
            max_input_chars: config.max_input_chars,
            embed_timeout: config.embed_timeout,
            generate_timeout: config.generate_timeout,
            fallback_reason: config
                .fallback_enabled
                .then(|| config.fallback_reason.clone()),
        }
    }
}

pub struct ClassificationService {
    embedder: Arc<dyn Embedder>,
    reasoner: Reasoner,
    store: Arc<TaxonomyStore>,
    settings: ClassifierSettings,
}

impl ClassificationService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reasoner: Reasoner,
        store: Arc<TaxonomyStore>,
        settings: ClassifierSettings,
    ) -> Self {
        Self {
            embedder,
            reasoner,
            store,
            settings,
        }
    }

    pub async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, AppError> {
        let text = validate_input(&request.user_input, self.settings.max_input_chars)?;

        let query = timeout(
            self.settings.embed_timeout,
            self.embedder.embed(text, EmbedTask::Query),
        )
        .await
        .map_err(|_| AppError::Timeout { stage: "embedding" })??;

        let snapshot = self.store.all();
        if query.len() != snapshot.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: snapshot.dimension(),
                actual: query.len(),
            }
            .into());
        }

        let candidates = rank(&query, snapshot.entries(), self.settings.candidate_count)?;
        let top = candidates.first().cloned().ok_or(AppError::NoCandidates)?;

        let reason = match timeout(
            self.settings.generate_timeout,
            self.reasoner.explain(text, &top, &candidates),
        )
        .await
        {
            Ok(Ok(reason)) => reason,
            Ok(Err(e)) => self.fallback(e.into())?,
            Err(_) => self.fallback(AppError::Timeout { stage: "generation" })?,
        };

        Ok(ClassificationResponse {
            code: top.code,
            name: top.name,
            reason,
            candidates,
            user_input: request.user_input.clone(),
        })
    }

    /// Degrades to the configured fallback reason, or gives the error back.
    fn fallback(&self, err: AppError) -> Result<String, AppError> {
        match &self.settings.fallback_reason {
            Some(reason) => {
                warn!("Reasoner failed, serving fallback reason: {err}");
                Ok(reason.clone())
            }
            None => Err(err),
        }
    }
}

/// Returns the trimmed input, or `InvalidInput` if it is blank or too long.
fn validate_input(user_input: &str, max_chars: usize) -> Result<&str, AppError> {
    let text = user_input.trim();
    if text.is_empty() {
        return Err(AppError::InvalidInput(
            "user_input cannot be empty".to_string(),
        ));
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(AppError::InvalidInput(format!(
            "user_input must be at most {max_chars} characters (got {chars})"
        )));
    }
    Ok(text)
}
