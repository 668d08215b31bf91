//! Taxonomy indexing: embeds every occupation once and persists the result.
//!
//! The index file lets a restart or a refresh reuse earlier embeddings: its
//! vectors seed the document cache, so only new or edited occupations reach
//! the provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{loader, validate_raw, RawOccupation, TaxonomyEntry, TaxonomyError, TaxonomySnapshot};
use crate::embedding::cache::CachedEmbedder;
use crate::embedding::{EmbedTask, Embedder};

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    model: String,
    built_at: DateTime<Utc>,
    entries: Vec<TaxonomyEntry>,
}

/// Embeds each occupation's canonical text, in source order, and validates the result.
pub async fn build_snapshot(
    raw: &[RawOccupation],
    embedder: &dyn Embedder,
    model: &str,
) -> Result<TaxonomySnapshot, TaxonomyError> {
    validate_raw(raw)?;

    let mut entries = Vec::with_capacity(raw.len());
    for occupation in raw {
        let embedding = embedder
            .embed(&occupation.canonical_text(), EmbedTask::Document)
            .await
            .map_err(|source| TaxonomyError::Indexing {
                code: occupation.code.clone(),
                source,
            })?;

        entries.push(TaxonomyEntry {
            code: occupation.code.clone(),
            name: occupation.name.clone(),
            description: occupation.description.clone(),
            embedding,
        });
    }

    TaxonomySnapshot::new(model, entries)
}

/// Reads a persisted index. A missing file is `Ok(None)`.
pub fn read_index(path: &Path) -> Result<Option<TaxonomySnapshot>, TaxonomyError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(TaxonomyError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let file: IndexFile = serde_json::from_str(&raw).map_err(|source| TaxonomyError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    TaxonomySnapshot::from_parts(file.model, file.built_at, file.entries).map(Some)
}

/// Writes the index through a temp file in the same directory, then renames it into place.
pub fn write_index(path: &Path, snapshot: &TaxonomySnapshot) -> Result<(), TaxonomyError> {
    let io_err = |source| TaxonomyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let file = IndexFile {
        model: snapshot.model().to_string(),
        built_at: snapshot.built_at(),
        entries: snapshot.entries().to_vec(),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer(&mut tmp, &file).map_err(|source| TaxonomyError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Owns the load → embed → persist cycle used at startup and on reload.
pub struct TaxonomyIndexer {
    source: Option<PathBuf>,
    index_path: PathBuf,
    embedder: Arc<CachedEmbedder>,
    model: String,
}

impl TaxonomyIndexer {
    pub fn new(
        source: Option<PathBuf>,
        index_path: PathBuf,
        embedder: Arc<CachedEmbedder>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            source,
            index_path,
            embedder,
            model: model.into(),
        }
    }

    /// Seeds the document cache from the persisted index, if it was built
    /// with the same embedding model. Returns how many vectors were seeded.
    pub async fn warm_from_index(&self) -> usize {
        let path = self.index_path.clone();
        let read = tokio::task::spawn_blocking(move || read_index(&path))
            .await
            .map_err(TaxonomyError::from)
            .and_then(|read| read);

        match read {
            Ok(Some(snapshot)) if snapshot.model() == self.model => {
                for entry in snapshot.entries() {
                    self.embedder
                        .seed(&entry.canonical_text(), entry.embedding.clone());
                }
                info!(
                    "Seeded {} embeddings from {}",
                    snapshot.len(),
                    self.index_path.display()
                );
                snapshot.len()
            }
            Ok(Some(snapshot)) => {
                info!(
                    "Ignoring index built with model '{}' (current: '{}')",
                    snapshot.model(),
                    self.model
                );
                0
            }
            Ok(None) => 0,
            Err(e) => {
                warn!("Ignoring unreadable taxonomy index: {e}");
                0
            }
        }
    }

    /// Loads the taxonomy source and embeds it. Nothing is written; call
    /// [`persist`](Self::persist) once the snapshot is accepted.
    pub async fn rebuild(&self) -> Result<TaxonomySnapshot, TaxonomyError> {
        let source = self.source.clone();
        let raw = tokio::task::spawn_blocking(move || loader::load(source.as_deref())).await??;
        let snapshot = build_snapshot(&raw, self.embedder.as_ref(), &self.model).await?;

        info!(
            "Indexed {} occupations (dimension {})",
            snapshot.len(),
            snapshot.dimension()
        );
        Ok(snapshot)
    }

    /// Writes `snapshot` to the index file. A failed write is logged only.
    pub async fn persist(&self, snapshot: Arc<TaxonomySnapshot>) {
        let path = self.index_path.clone();
        let written = tokio::task::spawn_blocking(move || write_index(&path, &snapshot))
            .await
            .map_err(TaxonomyError::from)
            .and_then(|written| written);

        if let Err(e) = written {
            warn!("Could not persist taxonomy index: {e}");
        }
    }
}
