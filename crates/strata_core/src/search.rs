//! Brute-force semantic search over stored embeddings.
//!
//! Candidates are entities with a non-empty stored vector. Each is scored by
//! cosine similarity against the query, scores under the threshold are
//! dropped, and the rest are returned best first. The scan is O(n) per query;
//! an adapter may answer [`PersistenceAdapter::semantic_search`] from an index
//! instead, as long as it returns the same hits.
//!
//! [`PersistenceAdapter::semantic_search`]: crate::PersistenceAdapter::semantic_search

use crate::entity::Entity;
use crate::error::StoreResult;
use std::cmp::Ordering;

/// Slack allowed when comparing a score to the minimum similarity.
///
/// Floating-point cosine of a vector with itself can land a few ulps under
/// 1.0; the tolerance keeps an identical vector inside a 1.0 threshold.
pub const SIMILARITY_TOLERANCE: f32 = 1e-6;

/// Produces embeddings for text.
///
/// Generation may be slow or remote. Repositories call it before a
/// transaction opens, never inside one.
pub trait EmbeddingService: Send + Sync {
    /// Returns the embedding of `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding cannot be produced.
    fn generate(&self, text: &str) -> StoreResult<Vec<f32>>;

    /// Cosine similarity between two vectors.
    fn cosine_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// An entity paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<T> {
    /// The matching entity.
    pub entity: T,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
}

/// Cosine similarity of `a` and `b`.
///
/// Returns 0 for empty vectors, vectors of different length, or a zero
/// vector.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Scores `candidates` against `query` and keeps the best `limit`.
///
/// Candidates without an embedding are skipped. Equal scores keep their
/// candidate order.
pub fn rank_by_similarity<T, I>(
    query: &[f32],
    candidates: I,
    limit: usize,
    min_similarity: f32,
) -> Vec<SearchHit<T>>
where
    T: Entity,
    I: IntoIterator<Item = T>,
{
    rank_with(query, candidates, limit, min_similarity, cosine_similarity)
}

/// Like [`rank_by_similarity`] with a caller-supplied similarity function.
pub fn rank_with<T, I, F>(
    query: &[f32],
    candidates: I,
    limit: usize,
    min_similarity: f32,
    similarity: F,
) -> Vec<SearchHit<T>>
where
    T: Entity,
    I: IntoIterator<Item = T>,
    F: Fn(&[f32], &[f32]) -> f32,
{
    if limit == 0 || query.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit<T>> = candidates
        .into_iter()
        .filter_map(|entity| {
            let score = match entity.embedding() {
                Some(vector) if !vector.is_empty() => similarity(query, vector),
                _ => return None,
            };
            (score + SIMILARITY_TOLERANCE >= min_similarity).then_some(SearchHit { entity, score })
        })
        .collect();

    // sort_by is stable
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}
