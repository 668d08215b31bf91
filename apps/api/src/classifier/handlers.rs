use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::classifier::{ClassificationRequest, ClassificationResponse};
use crate::errors::AppError;
use crate::state::AppState;

const LOG_PREVIEW_CHARS: usize = 50;

/// POST /api/classify
///
/// Classifies a free-text job description into the occupation taxonomy.
/// Body rejections are reported through `AppError` so every failure carries `detail`.
pub async fn handle_classify(
    State(state): State<AppState>,
    payload: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::InvalidInput(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let span = info_span!("classify", request_id = %Uuid::new_v4());
    async move {
        let preview: String = request.user_input.chars().take(LOG_PREVIEW_CHARS).collect();
        info!("Classification request: {preview}");

        let response = state.classifier.classify(&request).await?;

        info!("Classification result: [{}] {}", response.code, response.name);
        Ok::<_, AppError>(Json(response))
    }
    .instrument(span)
    .await
}
