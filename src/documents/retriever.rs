//! Chunk Retrieval
//!
//! Scores every candidate chunk against a query vector and keeps the best.
//! This is a linear scan; candidate sets are all chunks of one document.

use serde::{Deserialize, Serialize};

use super::chunker::Chunk;
use super::embeddings::{cosine_similarity, EmbeddingError};

/// Default number of chunks handed to the answer step
pub const DEFAULT_TOP_K: usize = 5;

/// A chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Ordering key for a score: NaN ranks below everything, and -0.0 ties with 0.0
fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score + 0.0
    }
}

/// Score candidates and return the indices of the `top_k` best, best first.
///
/// The sort is stable, so equal scores keep candidate order.
fn top_indices(
    query: &[f32],
    candidates: &[Chunk],
    top_k: usize,
) -> Result<Vec<(usize, f32)>, EmbeddingError> {
    let mut scored = candidates.iter()
        .enumerate()
        .map(|(i, chunk)| cosine_similarity(query, &chunk.embedding).map(|score| (i, score)))
        .collect::<Result<Vec<_>, _>>()?;

    scored.sort_by(|a, b| sort_key(b.1).total_cmp(&sort_key(a.1)));
    scored.truncate(top_k);
    Ok(scored)
}

/// Rank every candidate, most relevant first
pub fn rank(query: &[f32], candidates: &[Chunk]) -> Result<Vec<RankedChunk>, EmbeddingError> {
    retrieve_ranked(query, candidates, candidates.len())
}

/// Return the `top_k` most similar chunks with their scores
pub fn retrieve_ranked(
    query: &[f32],
    candidates: &[Chunk],
    top_k: usize,
) -> Result<Vec<RankedChunk>, EmbeddingError> {
    let best = top_indices(query, candidates, top_k)?;
    Ok(best.into_iter()
        .map(|(i, score)| RankedChunk {
            chunk: candidates[i].clone(),
            score,
        })
        .collect())
}

/// Return the `top_k` most similar chunks, most relevant first
pub fn retrieve(
    query: &[f32],
    candidates: &[Chunk],
    top_k: usize,
) -> Result<Vec<Chunk>, EmbeddingError> {
    let best = top_indices(query, candidates, top_k)?;
    Ok(best.into_iter().map(|(i, _)| candidates[i].clone()).collect())
}
