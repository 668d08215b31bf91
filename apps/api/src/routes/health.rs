use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Occupation classification API - POST /api/classify",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health
/// Reports the taxonomy snapshot currently in service.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.all();
    Json(json!({
        "status": "healthy",
        "message": format!("{} occupations loaded", snapshot.len()),
        "entries": snapshot.len(),
        "dimension": snapshot.dimension(),
        "model": snapshot.model(),
        "built_at": snapshot.built_at(),
    }))
}
