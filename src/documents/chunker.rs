//! Page Chunking
//!
//! Splits page text into word-bounded segments for embedding and retrieval.
//! Words are never split, so a single word longer than the limit becomes
//! its own oversized segment.

use serde::{Deserialize, Serialize};

use super::embeddings::Embedding;
use super::pages::{is_separator, PageText};

/// Default maximum segment length in characters
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 3000;

/// A segment of page text, not yet embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub content: String,
    pub page_number: u32,
}

/// An embedded chunk of a document page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub content: String,
    /// Page the content was taken from
    pub page_number: u32,
    pub embedding: Embedding,
}

impl Chunk {
    pub fn from_segment(segment: TextSegment, embedding: Embedding) -> Self {
        Self {
            content: segment.content,
            page_number: segment.page_number,
            embedding,
        }
    }
}

/// Split text into segments of at most `max_chunk_size` characters.
///
/// Each word costs its character length plus one for the joining space.
/// A segment is closed as soon as the next word would push the running cost
/// past the limit. Blank text yields no segments.
pub fn chunk_text(text: &str, page_number: u32, max_chunk_size: usize) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;

    for word in text.split(is_separator).filter(|w| !w.is_empty()) {
        let word_size = word.chars().count() + 1;

        if current_size + word_size > max_chunk_size && !current.is_empty() {
            segments.push(TextSegment {
                content: current.join(" "),
                page_number,
            });
            current.clear();
            current_size = 0;
        }

        current.push(word);
        current_size += word_size;
    }

    if !current.is_empty() {
        segments.push(TextSegment {
            content: current.join(" "),
            page_number,
        });
    }

    segments
}

/// Chunk a whole page with the given size limit
pub fn chunk_page(page: &PageText, max_chunk_size: usize) -> Vec<TextSegment> {
    chunk_text(&page.text, page.page_number, max_chunk_size)
}
