//! Text Embeddings
//!
//! Generates fixed-size vectors for page chunks and questions, and scores
//! them against each other with cosine similarity.
//!
//! The default embedder is a salted SHA-256 pseudo-embedding. It is stable
//! (the same text always produces the same vector) but carries no semantic
//! signal: only texts that normalise to the same string score highly.
//! Anything implementing [`TextEmbedder`] can be swapped in.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use super::pages::is_separator;

/// Dimensionality of stored and query vectors.
pub const EMBEDDING_DIM: usize = 1536;

/// Values taken from one SHA-256 digest (32 bytes as four i64 words)
const VALUES_PER_DIGEST: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Embedding generation failed: {0}")]
    GenerationFailed(String),
}

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Anything that can turn text into a fixed-length vector.
pub trait TextEmbedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Deterministic hash-based embedder.
///
/// Text is lowercased and trimmed, then hashed `dimension / 32` times with
/// the suffix `_{round}`. Every digest is read as four little-endian `i64`
/// words scaled into `[-1, 1]`. Unfilled slots stay `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_embedding(&self, text: &str) -> Embedding {
        let normalized = text.trim_matches(is_separator).to_lowercase();
        let rounds = self.dimension / 32;
        let mut values = Vec::with_capacity(self.dimension);

        for round in 0..rounds {
            let digest = Sha256::digest(format!("{}_{}", normalized, round).as_bytes());
            for word in digest.chunks_exact(8).take(VALUES_PER_DIGEST) {
                if values.len() >= self.dimension {
                    break;
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(word);
                let raw = i64::from_le_bytes(bytes);
                values.push((raw as f64 / i64::MAX as f64) as f32);
            }
        }

        values.resize(self.dimension, 0.0);
        values
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEmbedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(self.hash_embedding(text))
    }
}

/// Memoising wrapper around another embedder, keyed by exact input text.
///
/// Extracted PDFs repeat running headers and footers on every page, so the
/// same strings come through many times in one document.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: RwLock<HashMap<String, Embedding>>,
    max_size: usize,
}

impl<E: TextEmbedder> CachedEmbedder<E> {
    pub fn new(inner: E, max_size: usize) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    fn insert(&self, text: &str, embedding: Embedding) {
        if self.max_size == 0 {
            return;
        }
        let mut cache = self.cache.write();
        // Simple eviction: if at capacity, drop half the entries
        if cache.len() >= self.max_size {
            let keys_to_remove: Vec<String> = cache.keys()
                .take((self.max_size / 2).max(1))
                .cloned()
                .collect();
            for key in keys_to_remove {
                cache.remove(&key);
            }
            debug!(remaining = cache.len(), "Embedding cache evicted entries");
        }
        cache.insert(text.to_string(), embedding);
    }
}

impl<E: TextEmbedder> TextEmbedder for CachedEmbedder<E> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(hit) = self.cache.read().get(text) {
            return Ok(hit.clone());
        }
        let embedding = self.inner.embed(text)?;
        self.insert(text, embedding.clone());
        Ok(embedding)
    }
}

/// Embed text with the default hash embedder
pub fn generate_embedding(text: &str) -> Embedding {
    HashEmbedder::new().hash_embedding(text)
}

/// Calculate cosine similarity between two embeddings.
///
/// Vectors of different length are rejected. A zero-norm vector scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Check that an embedding has the length an embedder promised
pub(crate) fn check_dimension(embedding: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
