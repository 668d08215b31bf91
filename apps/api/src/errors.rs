use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::reasoning::GenerationError;
use crate::retrieval::RetrievalError;
use crate::taxonomy::TaxonomyError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every failure body is `{"detail": "<message>"}`; the frontend shows
/// `detail` verbatim, so upstream error text is logged here and never sent.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("No candidates found")]
    NoCandidates,

    #[error("{stage} timed out")]
    Timeout { stage: &'static str },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Embedding(EmbeddingError::EmptyInput) => StatusCode::BAD_REQUEST,
            AppError::Embedding(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Retrieval(_)
            | AppError::Taxonomy(_)
            | AppError::NoCandidates => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Embedding(EmbeddingError::EmptyInput) => {
                "Please enter a description of the job.".to_string()
            }
            AppError::Embedding(e) => {
                tracing::error!("Embedding error: {e}");
                "The classification service is temporarily unavailable. Please try again later."
                    .to_string()
            }
            AppError::Generation(e) => {
                tracing::error!("Generation error: {e}");
                "The classification explanation could not be generated. Please try again later."
                    .to_string()
            }
            AppError::Timeout { stage } => {
                tracing::error!("{stage} timed out");
                "The classification took too long. Please try again later.".to_string()
            }
            AppError::Retrieval(e) => {
                tracing::error!("Retrieval error: {e}");
                "An internal error occurred while classifying.".to_string()
            }
            AppError::Taxonomy(e) => {
                tracing::error!("Taxonomy error: {e}");
                "The occupation taxonomy could not be loaded.".to_string()
            }
            AppError::NoCandidates => {
                tracing::error!("Retrieval produced no candidates");
                "No matching occupation was found.".to_string()
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
