//! Batch Ingest
//!
//! Reads and indexes a batch of extracted-text files, then stores one
//! document per file. Nothing is written until every file has indexed
//! cleanly, so a failed batch leaves the store as it was.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::documents::{load_pages, Chunk, Pipeline, TextEmbedder};
use crate::store::{DocumentStore, StoreError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("A title can only be given for a single file (got {0} files)")]
    TitleWithMultipleFiles(usize),
    #[error("{} of {} files failed to index, nothing stored: {}", .failures.len(), .total, describe(.failures))]
    Failed {
        total: usize,
        failures: Vec<FileFailure>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A file that could not be read or indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

fn describe(failures: &[FileFailure]) -> String {
    failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
}

/// One stored document from a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedDocument {
    pub id: String,
    pub title: String,
    pub pages: usize,
    pub chunks: usize,
}

struct IndexedFile {
    path: PathBuf,
    page_count: usize,
    chunks: Vec<Chunk>,
}

/// Title used when none is given: the file name without extension
pub fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn index_file<E: TextEmbedder>(pipeline: &Pipeline<E>, path: &Path) -> Result<IndexedFile, String> {
    let pages = load_pages(path).map_err(|e| e.to_string())?;
    let chunks = pipeline.index_document(&pages).map_err(|e| e.to_string())?;
    Ok(IndexedFile {
        path: path.to_path_buf(),
        page_count: pages.len(),
        chunks,
    })
}

/// Index every file, then store them in input order.
///
/// Files are indexed in parallel on the blocking pool. If any file fails,
/// every failure is reported and no document is created. If a store write
/// fails midway, documents already written by this call are deleted.
pub async fn ingest_files<E>(
    store: &DocumentStore,
    pipeline: Arc<Pipeline<E>>,
    files: Vec<PathBuf>,
    title: Option<String>,
) -> Result<Vec<IngestedDocument>, IngestError>
where
    E: TextEmbedder + 'static,
{
    if title.is_some() && files.len() > 1 {
        return Err(IngestError::TitleWithMultipleFiles(files.len()));
    }

    let total = files.len();
    let tasks = files.into_iter().map(|path| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let task_path = path.clone();
            let joined =
                tokio::task::spawn_blocking(move || index_file(&pipeline, &task_path)).await;
            match joined {
                Ok(Ok(indexed)) => Ok(indexed),
                Ok(Err(reason)) => Err(FileFailure { path, reason }),
                Err(e) => Err(FileFailure {
                    path,
                    reason: format!("indexing task failed: {}", e),
                }),
            }
        }
    });
    let results = futures::future::join_all(tasks).await;

    let mut indexed = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(file) => indexed.push(file),
            Err(failure) => {
                warn!(path = %failure.path.display(), reason = %failure.reason, "Failed to index file");
                failures.push(failure);
            }
        }
    }
    if !failures.is_empty() {
        return Err(IngestError::Failed { total, failures });
    }

    let mut stored: Vec<IngestedDocument> = Vec::with_capacity(indexed.len());
    for file in indexed {
        if file.chunks.is_empty() {
            warn!(path = %file.path.display(), "No extractable text; storing empty document");
        }

        let doc_title = title.clone().unwrap_or_else(|| default_title(&file.path));
        let source = file.path.to_string_lossy().to_string();
        match store.create_document(&doc_title, Some(&source), &file.chunks) {
            Ok(document) => stored.push(IngestedDocument {
                id: document.id,
                title: document.title,
                pages: file.page_count,
                chunks: document.chunk_count,
            }),
            Err(e) => {
                rollback(store, &stored);
                return Err(e.into());
            }
        }
    }

    info!(documents = stored.len(), "Ingest complete");
    Ok(stored)
}

fn rollback(store: &DocumentStore, stored: &[IngestedDocument]) {
    for document in stored {
        match store.delete_document(&document.id) {
            Ok(()) => debug!(id = %document.id, "Rolled back stored document"),
            Err(e) => warn!(id = %document.id, error = %e, "Failed to roll back stored document"),
        }
    }
}
