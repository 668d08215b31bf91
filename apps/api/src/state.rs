use std::sync::Arc;

use crate::classifier::ClassificationService;
use crate::taxonomy::indexer::TaxonomyIndexer;
use crate::taxonomy::TaxonomyStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaxonomyStore>,
    pub classifier: Arc<ClassificationService>,
    /// Rebuilds the taxonomy snapshot for the reload endpoint.
    pub indexer: Arc<TaxonomyIndexer>,
}
