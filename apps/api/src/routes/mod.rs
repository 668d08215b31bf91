pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::classifier::handlers as classifier;
use crate::state::AppState;
use crate::taxonomy::handlers as taxonomy;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/api/health", get(health::health_handler))
        .route("/api/classify", post(classifier::handle_classify))
        .route("/api/taxonomy/reload", post(taxonomy::handle_reload))
        .with_state(state)
}
