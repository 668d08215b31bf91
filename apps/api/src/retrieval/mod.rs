//! Retriever: brute-force cosine ranking over the taxonomy.
//!
//! Algorithm:
//! 1. Score every entry with cosine similarity against the query
//!    (0.0 when either vector has zero magnitude).
//! 2. Stable sort by score, descending, so ties keep taxonomy order.
//! 3. Keep the first `k`.
//!
//! O(N·D) per request. N is a few hundred occupations, which keeps the scan
//! well under the cost of the provider round trips around it.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::taxonomy::TaxonomyEntry;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("taxonomy corpus is empty")]
    EmptyCorpus,

    #[error("query dimension {actual} does not match taxonomy dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A ranked taxonomy match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub name: String,
    pub description: String,
    pub similarity: f32, // -1.0 – 1.0
}

/// Cosine of the angle between `a` and `b`. Zero-magnitude input scores 0.0.
///
/// Each vector is divided by its largest absolute component and the sums are
/// accumulated in `f64`, so very large or very small components neither
/// overflow nor underflow.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let scale_a = max_abs(a);
    let scale_b = max_abs(b);
    if scale_a == 0.0 || scale_b == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (f64::from(*x) / scale_a) * (f64::from(*y) / scale_b))
        .sum();
    let norm_a = squared_norm(a, scale_a).sqrt();
    let norm_b = squared_norm(b, scale_b).sqrt();

    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() {
        return 0.0;
    }
    // Rounding can push parallel vectors a hair past ±1.
    similarity.clamp(-1.0, 1.0) as f32
}

fn max_abs(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(x.abs()))
        .filter(|x| x.is_finite())
        .fold(0.0, f64::max)
}

fn squared_norm(v: &[f32], scale: f64) -> f64 {
    v.iter()
        .map(|x| {
            let x = f64::from(*x) / scale;
            x * x
        })
        .sum()
}

/// Ranks `corpus` against `query` and returns the top `k` candidates.
pub fn rank(
    query: &[f32],
    corpus: &[TaxonomyEntry],
    k: usize,
) -> Result<Vec<Candidate>, RetrievalError> {
    if corpus.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }

    let mut scored = Vec::with_capacity(corpus.len());
    for entry in corpus {
        if entry.embedding.len() != query.len() {
            return Err(RetrievalError::DimensionMismatch {
                expected: entry.embedding.len(),
                actual: query.len(),
            });
        }
        scored.push((cosine_similarity(query, &entry.embedding), entry));
    }

    // `sort_by` is stable: equal scores stay in insertion order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(similarity, entry)| Candidate {
            code: entry.code.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            similarity,
        })
        .collect())
}
