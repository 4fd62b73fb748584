// Docqa Library
// Exports core modules for use by the CLI binary

pub mod config;
pub mod documents;
pub mod ingest;
pub mod sharing;
pub mod store;

// Re-export commonly used types for CLI
pub use config::{ConfigError, Settings};

pub use documents::{
    answer_context, chunk_text, cosine_similarity, format_context, generate_embedding,
    index_document, load_pages, pages_from_text, retrieve, CachedEmbedder, Chunk, Embedding,
    EmbeddingError, HashEmbedder, PageError, PageText, Pipeline, RankedChunk, TextEmbedder,
    TextSegment, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_TOP_K, EMBEDDING_DIM,
};

pub use ingest::{default_title, ingest_files, FileFailure, IngestError, IngestedDocument};

pub use sharing::{
    create_chat_session, create_shareable_link, get_chat_session, get_document_by_share_token,
    resolve_shared_session, revoke_share_access, touch_chat_session, ShareLink, SharingError,
};

pub use store::{ChatSession, Document, DocumentInfo, DocumentStore, StoreError};
