//! Taxonomy Store: the fixed set of occupations with their embeddings.
//!
//! A [`TaxonomySnapshot`] is validated once and never mutated. The
//! [`TaxonomyStore`] hands out `Arc` snapshots and swaps in a new one as a
//! whole on refresh, so a request keeps the snapshot it started with.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingError;

pub mod defaults;
pub mod handlers;
pub mod indexer;
pub mod loader;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy is empty")]
    EmptyCorpus,

    #[error("taxonomy entry #{index} has no code")]
    MissingCode { index: usize },

    #[error("taxonomy entry '{code}' has no description")]
    MissingDescription { code: String },

    #[error("taxonomy code '{code}' appears more than once")]
    DuplicateCode { code: String },

    #[error("taxonomy entry '{code}' has an empty embedding")]
    EmptyEmbedding { code: String },

    #[error("taxonomy entry '{code}' has embedding dimension {actual}, expected {expected}")]
    DimensionMismatch {
        code: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to embed taxonomy entry '{code}': {source}")]
    Indexing {
        code: String,
        source: EmbeddingError,
    },

    #[error("taxonomy file task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An occupation as read from the taxonomy source, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOccupation {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl RawOccupation {
    pub fn canonical_text(&self) -> String {
        canonical_text(&self.name, &self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub code: String,
    pub name: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

impl TaxonomyEntry {
    pub fn canonical_text(&self) -> String {
        canonical_text(&self.name, &self.description)
    }
}

/// The text embedded for an occupation: `"{name}: {description}"`.
pub fn canonical_text(name: &str, description: &str) -> String {
    format!("{name}: {description}")
}

/// Checks the fields every occupation must carry before any embedding work is spent.
pub fn validate_raw(raw: &[RawOccupation]) -> Result<(), TaxonomyError> {
    if raw.is_empty() {
        return Err(TaxonomyError::EmptyCorpus);
    }
    let mut seen = HashSet::with_capacity(raw.len());
    for (index, occupation) in raw.iter().enumerate() {
        check_fields(index, &occupation.code, &occupation.description)?;
        if !seen.insert(occupation.code.as_str()) {
            return Err(TaxonomyError::DuplicateCode {
                code: occupation.code.clone(),
            });
        }
    }
    Ok(())
}

fn check_fields(index: usize, code: &str, description: &str) -> Result<(), TaxonomyError> {
    if code.trim().is_empty() {
        return Err(TaxonomyError::MissingCode { index });
    }
    if description.trim().is_empty() {
        return Err(TaxonomyError::MissingDescription {
            code: code.to_string(),
        });
    }
    Ok(())
}

/// A validated, immutable taxonomy version.
#[derive(Debug)]
pub struct TaxonomySnapshot {
    entries: Vec<TaxonomyEntry>,
    dimension: usize,
    model: String,
    built_at: DateTime<Utc>,
}

impl TaxonomySnapshot {
    pub fn new(model: impl Into<String>, entries: Vec<TaxonomyEntry>) -> Result<Self, TaxonomyError> {
        Self::from_parts(model.into(), Utc::now(), entries)
    }

    /// Rebuilds a snapshot with a known build time (used when reading an index file).
    pub fn from_parts(
        model: String,
        built_at: DateTime<Utc>,
        entries: Vec<TaxonomyEntry>,
    ) -> Result<Self, TaxonomyError> {
        let first = entries.first().ok_or(TaxonomyError::EmptyCorpus)?;
        let dimension = first.embedding.len();

        let mut seen = HashSet::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            check_fields(index, &entry.code, &entry.description)?;
            if !seen.insert(entry.code.as_str()) {
                return Err(TaxonomyError::DuplicateCode {
                    code: entry.code.clone(),
                });
            }
            if entry.embedding.is_empty() {
                return Err(TaxonomyError::EmptyEmbedding {
                    code: entry.code.clone(),
                });
            }
            if entry.embedding.len() != dimension {
                return Err(TaxonomyError::DimensionMismatch {
                    code: entry.code.clone(),
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
        }

        Ok(Self {
            entries,
            dimension,
            model,
            built_at,
        })
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Process-wide holder of the current snapshot. Reads are lock-free.
pub struct TaxonomyStore {
    current: ArcSwap<TaxonomySnapshot>,
}

impl TaxonomyStore {
    pub fn new(snapshot: impl Into<Arc<TaxonomySnapshot>>) -> Self {
        Self {
            current: ArcSwap::new(snapshot.into()),
        }
    }

    /// The snapshot in service right now.
    pub fn all(&self) -> Arc<TaxonomySnapshot> {
        self.current.load_full()
    }

    /// Puts `snapshot` in service and returns the one it replaced.
    pub fn replace(&self, snapshot: impl Into<Arc<TaxonomySnapshot>>) -> Arc<TaxonomySnapshot> {
        self.current.swap(snapshot.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, fire_and_ledger_snapshot};

    fn raw(code: &str, description: &str) -> RawOccupation {
        RawOccupation {
            code: code.to_string(),
            name: format!("name {code}"),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_snapshot_records_dimension_and_order() {
        let snapshot = fire_and_ledger_snapshot();
        assert_eq!(snapshot.dimension(), 3);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entries()[0].code, "32");
        assert_eq!(snapshot.model(), "stub-model");
    }

    #[test]
    fn test_empty_taxonomy_is_rejected() {
        let err = TaxonomySnapshot::new("m", vec![]).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyCorpus));
    }

    #[test]
    fn test_duplicate_codes_are_rejected() {
        let err = TaxonomySnapshot::new(
            "m",
            vec![
                entry("11", "a", "first", vec![1.0]),
                entry("11", "b", "second", vec![0.5]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateCode { code } if code == "11"));
    }

    #[test]
    fn test_missing_description_is_rejected() {
        let err = TaxonomySnapshot::new("m", vec![entry("11", "a", "  ", vec![1.0])]).unwrap_err();
        assert!(matches!(err, TaxonomyError::MissingDescription { code } if code == "11"));
    }

    #[test]
    fn test_mixed_dimensions_are_rejected() {
        let err = TaxonomySnapshot::new(
            "m",
            vec![
                entry("11", "a", "first", vec![1.0, 0.0]),
                entry("12", "b", "second", vec![1.0, 0.0, 0.0]),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TaxonomyError::DimensionMismatch { expected: 2, actual: 3, .. }
        ));
    }

    #[test]
    fn test_empty_embedding_is_rejected() {
        let err = TaxonomySnapshot::new("m", vec![entry("11", "a", "first", vec![])]).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyEmbedding { .. }));
    }

    #[test]
    fn test_validate_raw_catches_problems_before_embedding() {
        assert!(matches!(validate_raw(&[]), Err(TaxonomyError::EmptyCorpus)));
        assert!(matches!(
            validate_raw(&[raw("", "desc")]),
            Err(TaxonomyError::MissingCode { index: 0 })
        ));
        assert!(matches!(
            validate_raw(&[raw("11", "a"), raw("11", "b")]),
            Err(TaxonomyError::DuplicateCode { .. })
        ));
        assert!(validate_raw(&[raw("11", "a"), raw("12", "b")]).is_ok());
    }

    #[test]
    fn test_canonical_text_joins_name_and_description() {
        assert_eq!(canonical_text("教員", "授業"), "教員: 授業");
    }

    #[test]
    fn test_replace_leaves_held_snapshots_intact() {
        let store = TaxonomyStore::new(fire_and_ledger_snapshot());
        let before = store.all();

        let refreshed =
            TaxonomySnapshot::new("stub-model", vec![entry("99", "New", "new duties", vec![1.0])])
                .unwrap();
        let previous = store.replace(refreshed);

        assert_eq!(before.len(), 2);
        assert_eq!(previous.len(), 2);
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all().entries()[0].code, "99");
    }
}
