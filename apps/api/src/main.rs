mod classifier;
mod config;
mod embedding;
mod errors;
mod llm_client;
mod reasoning;
mod retrieval;
mod routes;
mod state;
mod taxonomy;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::classifier::{ClassificationService, ClassifierSettings};
use crate::config::Config;
use crate::embedding::cache::CachedEmbedder;
use crate::llm_client::LlmClient;
use crate::reasoning::Reasoner;
use crate::routes::build_router;
use crate::state::AppState;
use crate::taxonomy::indexer::TaxonomyIndexer;
use crate::taxonomy::TaxonomyStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting occupation API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client (embeddings + generation)
    let llm = Arc::new(LlmClient::from_config(&config)?);
    info!(
        "LLM client initialized (embedding: {}, generation: {})",
        llm.embedding_model(),
        llm.generation_model()
    );
    let embedder = Arc::new(CachedEmbedder::new(llm.clone()));

    // Build the taxonomy snapshot. Without it there is nothing to classify against.
    let indexer = Arc::new(TaxonomyIndexer::new(
        config.taxonomy_path.clone(),
        config.taxonomy_index_path.clone(),
        embedder.clone(),
        llm.embedding_model(),
    ));
    indexer.warm_from_index().await;
    let snapshot = Arc::new(
        indexer
            .rebuild()
            .await
            .context("Failed to build the taxonomy index; refusing to start")?,
    );
    info!(
        "Taxonomy ready: {} occupations, dimension {}",
        snapshot.len(),
        snapshot.dimension()
    );
    indexer.persist(snapshot.clone()).await;
    let store = Arc::new(TaxonomyStore::new(snapshot));

    let classifier = Arc::new(ClassificationService::new(
        embedder,
        Reasoner::new(llm.clone()),
        store.clone(),
        ClassifierSettings::from_config(&config),
    ));
    if !config.fallback_enabled {
        warn!("Reasoner fallback disabled; generation failures will surface as 502");
    }

    // Build app state
    let state = AppState {
        store,
        classifier,
        indexer,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Allows the configured frontend origins. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
