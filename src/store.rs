//! Document Store
//!
//! File-backed persistence for documents, their chunks, and shared chat
//! sessions. Layout under the data directory:
//!
//! ```text
//! documents/<id>/document.json
//! documents/<id>/chunks.json
//! chat_sessions.json
//! ```
//!
//! Chunks are written and read back verbatim, embeddings included.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use ulid::Ulid;

use crate::documents::Chunk;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Invalid document ID: {0}")]
    InvalidId(String),
}

/// Stored document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    /// File the text was ingested from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub chunk_count: usize,
    /// Whether the document can be reached through its share link
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
}

/// Summary shown alongside a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub title: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Chat session opened against a shared document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub document_id: String,
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Validate that a document ID contains only ASCII alphanumerics.
/// Rejects anything that could escape the documents directory.
pub fn validate_document_id(id: &str) -> Result<(), StoreError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Atomic write: write to a .tmp sibling then rename into place.
fn atomic_write(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub struct DocumentStore {
    root: PathBuf,
    /// Serialises read-modify-write of the session file
    sessions_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open a store, creating its directories if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("documents"))?;
        Ok(Self {
            root,
            sessions_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    fn document_dir(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_document_id(id)?;
        Ok(self.documents_dir().join(id))
    }

    fn sessions_path(&self) -> PathBuf {
        self.root.join("chat_sessions.json")
    }

    /// Store a new document together with its chunks
    pub fn create_document(
        &self,
        title: &str,
        source_path: Option<&str>,
        chunks: &[Chunk],
    ) -> Result<Document, StoreError> {
        let document = Document {
            id: Ulid::new().to_string(),
            title: title.to_string(),
            source_path: source_path.map(|s| s.to_string()),
            created_at: Utc::now(),
            chunk_count: chunks.len(),
            is_public: false,
            share_token: None,
        };

        let dir = self.document_dir(&document.id)?;
        fs::create_dir_all(&dir)?;
        // Chunks first so a visible document.json always has its chunks
        atomic_write(&dir.join("chunks.json"), &serde_json::to_string(chunks)?)?;
        atomic_write(&dir.join("document.json"), &serde_json::to_string_pretty(&document)?)?;

        info!(id = %document.id, title = %document.title, chunks = chunks.len(), "Stored document");
        Ok(document)
    }

    pub fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        let path = self.document_dir(id)?.join("document.json");
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        read_json(&path)
    }

    /// Overwrite metadata of an existing document
    pub fn update_document(&self, document: &Document) -> Result<(), StoreError> {
        let path = self.document_dir(&document.id)?.join("document.json");
        if !path.exists() {
            return Err(StoreError::NotFound(document.id.clone()));
        }
        atomic_write(&path, &serde_json::to_string_pretty(document)?)
    }

    /// All documents, newest first. Unreadable entries are skipped.
    pub fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let dir = self.documents_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path().join("document.json");
            if !path.exists() {
                continue;
            }
            match read_json::<Document>(&path) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(path = ?path, error = %e, "Failed to read document"),
            }
        }

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    /// Chunks of a document in stored order
    pub fn load_chunks(&self, id: &str) -> Result<Vec<Chunk>, StoreError> {
        let dir = self.document_dir(id)?;
        if !dir.join("document.json").exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let path = dir.join("chunks.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    pub fn document_info(&self, id: &str) -> Result<DocumentInfo, StoreError> {
        let document = self.get_document(id)?;
        Ok(DocumentInfo {
            title: document.title,
            chunk_count: document.chunk_count,
            created_at: document.created_at,
        })
    }

    /// Delete a document, its chunks, and any chat sessions on it
    pub fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let dir = self.document_dir(id)?;
        if !dir.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        fs::remove_dir_all(&dir)?;

        let _guard = self.sessions_lock.lock();
        let mut sessions = self.read_sessions()?;
        let before = sessions.len();
        sessions.retain(|s| s.document_id != id);
        if sessions.len() != before {
            self.write_sessions(&sessions)?;
        }

        info!(id = %id, sessions_removed = before - sessions.len(), "Deleted document");
        Ok(())
    }

    fn read_sessions(&self) -> Result<Vec<ChatSession>, StoreError> {
        let path = self.sessions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    fn write_sessions(&self, sessions: &[ChatSession]) -> Result<(), StoreError> {
        atomic_write(&self.sessions_path(), &serde_json::to_string_pretty(sessions)?)
    }

    pub fn find_session(&self, token: &str) -> Result<Option<ChatSession>, StoreError> {
        let _guard = self.sessions_lock.lock();
        Ok(self.read_sessions()?.into_iter().find(|s| s.session_token == token))
    }

    pub fn insert_session(&self, session: ChatSession) -> Result<(), StoreError> {
        let _guard = self.sessions_lock.lock();
        let mut sessions = self.read_sessions()?;
        sessions.push(session);
        self.write_sessions(&sessions)
    }

    /// Apply `update` to the session with `token`; returns the updated copy
    pub fn update_session<F>(&self, token: &str, update: F) -> Result<Option<ChatSession>, StoreError>
    where
        F: FnOnce(&mut ChatSession),
    {
        let _guard = self.sessions_lock.lock();
        let mut sessions = self.read_sessions()?;
        let updated = match sessions.iter_mut().find(|s| s.session_token == token) {
            Some(session) => {
                update(session);
                session.clone()
            }
            None => return Ok(None),
        };
        self.write_sessions(&sessions)?;
        Ok(Some(updated))
    }
}
