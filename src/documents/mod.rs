//! Document Indexing and Retrieval
//!
//! Page extraction, chunking, embedding, and top-K retrieval for question
//! answering over a document.

pub mod chunker;
pub mod embeddings;
pub mod pages;
pub mod pipeline;
pub mod retriever;

// Re-export key public types
pub use chunker::{chunk_page, chunk_text, Chunk, TextSegment, DEFAULT_MAX_CHUNK_SIZE};
pub use embeddings::{
    cosine_similarity, generate_embedding, CachedEmbedder, Embedding, EmbeddingError,
    HashEmbedder, TextEmbedder, EMBEDDING_DIM,
};
pub use pages::{load_pages, pages_from_text, PageError, PageText};
pub use pipeline::{answer_context, format_context, index_document, Pipeline};
pub use retriever::{rank, retrieve, retrieve_ranked, RankedChunk, DEFAULT_TOP_K};
