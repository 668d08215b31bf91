use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::taxonomy::TaxonomyError;

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub entries: usize,
    pub dimension: usize,
    pub previous_entries: usize,
}

/// POST /api/taxonomy/reload
///
/// Re-reads the taxonomy source, re-indexes it and swaps the store.
/// On any failure the snapshot in service and the index file are left untouched.
pub async fn handle_reload(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, AppError> {
    let snapshot = state.indexer.rebuild().await?;

    let current = state.store.all();
    if snapshot.dimension() != current.dimension() {
        let code = snapshot
            .entries()
            .first()
            .map(|e| e.code.clone())
            .unwrap_or_default();
        return Err(TaxonomyError::DimensionMismatch {
            code,
            expected: current.dimension(),
            actual: snapshot.dimension(),
        }
        .into());
    }

    let entries = snapshot.len();
    let dimension = snapshot.dimension();
    let snapshot = Arc::new(snapshot);
    let previous = state.store.replace(snapshot.clone());
    state.indexer.persist(snapshot).await;
    info!("Taxonomy reloaded: {} -> {} occupations", previous.len(), entries);

    Ok(Json(ReloadResponse {
        entries,
        dimension,
        previous_entries: previous.len(),
    }))
}
