//! Page Text Extraction
//!
//! Turns pre-extracted PDF text into per-page records. The extractor that
//! reads raw PDF bytes lives outside this crate; it hands us plain text with
//! one form feed (`\x0c`) between pages, which is what `pdftotext` emits.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Page separator emitted by text extractors
pub const PAGE_BREAK: char = '\u{000C}';

/// Maximum extracted-text file size (50 MB)
const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("File too large: {0} bytes (max {1} bytes)")]
    FileTooLarge(u64, u64),
}

/// True for characters that separate words in extracted text.
///
/// Unicode whitespace plus the ASCII information separators
/// (U+001C..=U+001F), which some extractors emit between fields and lines.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{001C}'..='\u{001F}').contains(&c)
}

/// Text of a single extracted page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    /// 1-based page number in the source document
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }

    /// True when the page carries no extractable text
    pub fn is_blank(&self) -> bool {
        self.text.trim_matches(is_separator).is_empty()
    }
}

/// Split extracted text into pages.
///
/// Pages are numbered from 1 in the order they appear. Blank pages are
/// dropped but still consume a page number, so numbering matches the source.
pub fn pages_from_text(raw: &str) -> Vec<PageText> {
    raw.split(PAGE_BREAK)
        .enumerate()
        .filter_map(|(i, text)| {
            let trimmed = text.trim_matches(is_separator);
            if trimmed.is_empty() {
                None
            } else {
                Some(PageText::new(i as u32 + 1, trimmed))
            }
        })
        .collect()
}

/// Read an extracted-text file and split it into pages
pub fn load_pages(path: &Path) -> Result<Vec<PageText>, PageError> {
    let file_size = fs::metadata(path)?.len();
    if file_size > MAX_FILE_SIZE {
        return Err(PageError::FileTooLarge(file_size, MAX_FILE_SIZE));
    }
    let raw = fs::read_to_string(path)?;
    Ok(pages_from_text(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pages_numbered_in_order() {
        let pages = pages_from_text("first page\u{000C}second page\u{000C}third");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], PageText::new(1, "first page"));
        assert_eq!(pages[2], PageText::new(3, "third"));
    }

    #[test]
    fn test_blank_pages_keep_numbering() {
        let pages = pages_from_text("intro\u{000C}   \n\u{000C}body");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[1].page_number, 3);
    }

    #[test]
    fn test_no_page_breaks_is_one_page() {
        let pages = pages_from_text("  just one page of text \n");
        assert_eq!(pages, vec![PageText::new(1, "just one page of text")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(pages_from_text("").is_empty());
        assert!(pages_from_text("\u{000C}\u{000C}").is_empty());
    }

    #[test]
    fn test_is_blank() {
        assert!(PageText::new(1, " \t\n").is_blank());
        assert!(!PageText::new(1, "x").is_blank());
    }

    #[test]
    fn test_information_separators_are_blank() {
        assert!(is_separator('\u{001C}'));
        assert!(is_separator('\u{001F}'));
        assert!(!is_separator('\u{001B}'));

        let pages = pages_from_text("\u{001E}\u{000C}\u{001F} body \u{001D}");
        assert_eq!(pages, vec![PageText::new(2, "body")]);
        assert!(PageText::new(1, "\u{001C}\u{001F}").is_blank());
    }

    #[test]
    fn test_load_pages_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "alpha\u{000C}beta").unwrap();

        let pages = load_pages(file.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "beta");
    }

    #[test]
    fn test_load_pages_missing_file() {
        let err = load_pages(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, PageError::Io(_)));
    }

    #[test]
    fn test_io_error_message_not_repeated() {
        use anyhow::Context;

        let path = Path::new("/definitely/not/here.txt");
        let os_message = std::fs::metadata(path).unwrap_err().to_string();
        let err = load_pages(path)
            .with_context(|| format!("reading {}", path.display()))
            .unwrap_err();

        let rendered = format!("{:#}", err);
        assert_eq!(rendered.matches(os_message.as_str()).count(), 1, "{}", rendered);
    }
}
