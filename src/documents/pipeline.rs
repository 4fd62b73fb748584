//! Indexing and Query Pipelines
//!
//! Indexing: pages -> segments -> embedded chunks, in page order.
//! Query: question -> query vector -> top-K chunks for the answer step.

use tracing::{debug, info};

use super::chunker::{chunk_page, Chunk, DEFAULT_MAX_CHUNK_SIZE};
use super::embeddings::{check_dimension, EmbeddingError, HashEmbedder, TextEmbedder};
use super::pages::PageText;
use super::retriever::{retrieve_ranked, RankedChunk, DEFAULT_TOP_K};

/// Chunker and embedder bound together
pub struct Pipeline<E> {
    embedder: E,
    max_chunk_size: usize,
}

impl<E: TextEmbedder> Pipeline<E> {
    pub fn new(embedder: E, max_chunk_size: usize) -> Self {
        Self {
            embedder,
            max_chunk_size,
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Chunk and embed every page.
    ///
    /// Output follows page order, then segment order within a page.
    /// Blank pages contribute nothing.
    pub fn index_document(&self, pages: &[PageText]) -> Result<Vec<Chunk>, EmbeddingError> {
        let dimension = self.embedder.dimension();
        let mut chunks = Vec::new();

        for page in pages {
            let segments = chunk_page(page, self.max_chunk_size);
            debug!(page = page.page_number, segments = segments.len(), "Chunked page");

            for segment in segments {
                let embedding = self.embedder.embed(&segment.content)?;
                check_dimension(&embedding, dimension)?;
                chunks.push(Chunk::from_segment(segment, embedding));
            }
        }

        info!(pages = pages.len(), chunks = chunks.len(), "Indexed document");
        Ok(chunks)
    }

    /// Find the chunks most relevant to a question.
    ///
    /// An empty chunk list gives an empty result; it is up to the answer
    /// step to say nothing was found.
    pub fn answer_context(
        &self,
        question: &str,
        document_chunks: &[Chunk],
        top_k: usize,
    ) -> Result<Vec<RankedChunk>, EmbeddingError> {
        if document_chunks.is_empty() {
            debug!("No chunks to search");
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(question)?;
        check_dimension(&query, self.embedder.dimension())?;

        let ranked = retrieve_ranked(&query, document_chunks, top_k)?;
        info!(
            candidates = document_chunks.len(),
            returned = ranked.len(),
            best_score = ranked.first().map(|r| r.score),
            "Retrieved context"
        );
        Ok(ranked)
    }
}

impl Default for Pipeline<HashEmbedder> {
    fn default() -> Self {
        Self::new(HashEmbedder::new(), DEFAULT_MAX_CHUNK_SIZE)
    }
}

/// Index pages with the default embedder and chunk size
pub fn index_document(pages: &[PageText]) -> Result<Vec<Chunk>, EmbeddingError> {
    Pipeline::default().index_document(pages)
}

/// Retrieve context for a question with the default embedder
pub fn answer_context(
    question: &str,
    document_chunks: &[Chunk],
    top_k: usize,
) -> Result<Vec<RankedChunk>, EmbeddingError> {
    Pipeline::default().answer_context(question, document_chunks, top_k)
}

/// Default-size variant of [`answer_context`]
pub fn answer_context_default(
    question: &str,
    document_chunks: &[Chunk],
) -> Result<Vec<RankedChunk>, EmbeddingError> {
    answer_context(question, document_chunks, DEFAULT_TOP_K)
}

/// Render ranked chunks as the context block for the answering model.
///
/// One `[Page N] content` entry per chunk, separated by a blank line.
pub fn format_context(ranked: &[RankedChunk]) -> String {
    ranked.iter()
        .map(|r| format!("[Page {}] {}", r.chunk.page_number, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::embeddings::{Embedding, EMBEDDING_DIM};

    #[test]
    fn test_end_to_end_cat_and_dog() {
        let pipeline = Pipeline::new(HashEmbedder::new(), 10);
        let pages = vec![PageText::new(1, "The cat sat. The dog ran.")];

        let chunks = pipeline.index_document(&pages).unwrap();
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 10);
            assert_eq!(chunk.embedding.len(), EMBEDDING_DIM);
            assert_eq!(chunk.page_number, 1);
        }

        let ranked = pipeline.answer_context("sat. The", &chunks, 5).unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].chunk.content, "sat. The");
        assert!((ranked[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_question_normalised_like_chunks() {
        let chunks = Pipeline::new(HashEmbedder::new(), 10)
            .index_document(&[PageText::new(1, "The cat sat. The dog ran.")])
            .unwrap();

        let ranked = answer_context("  DOG RAN. ", &chunks, 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk.content, "dog ran.");
    }

    #[test]
    fn test_order_follows_pages() {
        let pipeline = Pipeline::new(HashEmbedder::new(), 14);
        let pages = vec![
            PageText::new(1, "alpha beta gamma delta"),
            PageText::new(2, ""),
            PageText::new(3, "epsilon zeta"),
        ];

        let chunks = pipeline.index_document(&pages).unwrap();
        let pages_seen: Vec<u32> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages_seen, vec![1, 1, 3]);
        assert_eq!(chunks[0].content, "alpha beta");
        assert_eq!(chunks[1].content, "gamma delta");
        assert_eq!(chunks[2].content, "epsilon zeta");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(index_document(&[]).unwrap().is_empty());
        assert!(answer_context("anything", &[], 5).unwrap().is_empty());
        assert!(answer_context_default("anything", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_default_pipeline_settings() {
        let pipeline = Pipeline::default();
        assert_eq!(pipeline.max_chunk_size(), DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(pipeline.embedder().dimension(), EMBEDDING_DIM);

        let chunks = index_document(&[PageText::new(2, "a short page")]).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 2);
    }

    #[test]
    fn test_stored_chunk_with_wrong_dimension() {
        let stale = Chunk {
            content: "old".to_string(),
            page_number: 1,
            embedding: vec![0.5; 8],
        };
        let err = answer_context("old", &[stale], 5).unwrap_err();
        assert_eq!(
            err,
            EmbeddingError::DimensionMismatch { expected: EMBEDDING_DIM, actual: 8 }
        );
    }

    struct ShortEmbedder;

    impl TextEmbedder for ShortEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn test_embedder_breaking_its_dimension() {
        let pipeline = Pipeline::new(ShortEmbedder, 100);
        let err = pipeline.index_document(&[PageText::new(1, "text")]).unwrap_err();
        assert_eq!(err, EmbeddingError::DimensionMismatch { expected: 4, actual: 2 });
    }

    struct FailingEmbedder;

    impl TextEmbedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::GenerationFailed("model offline".to_string()))
        }
    }

    #[test]
    fn test_embedder_failure_propagates() {
        let pipeline = Pipeline::new(FailingEmbedder, 100);
        assert!(pipeline.index_document(&[PageText::new(1, "text")]).is_err());
        // No chunks means no embedding call at all
        assert!(pipeline.answer_context("q", &[], 5).unwrap().is_empty());
    }

    #[test]
    fn test_format_context() {
        let ranked = vec![
            RankedChunk {
                chunk: Chunk { content: "Revenue grew.".to_string(), page_number: 5, embedding: vec![] },
                score: 0.9,
            },
            RankedChunk {
                chunk: Chunk { content: "Costs fell.".to_string(), page_number: 2, embedding: vec![] },
                score: 0.4,
            },
        ];
        assert_eq!(format_context(&ranked), "[Page 5] Revenue grew.\n\n[Page 2] Costs fell.");
        assert_eq!(format_context(&[]), "");
    }
}
