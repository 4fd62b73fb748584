//! Share Links and Shared Chat Sessions
//!
//! A document becomes reachable by token once shared. Visitors open a chat
//! session against it and ask questions with the session token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ulid::Ulid;

use crate::store::{ChatSession, Document, DocumentStore, StoreError};

/// Random bytes per token (43 URL-safe characters once encoded)
const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum SharingError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid session token")]
    InvalidSession,
    #[error("Document not found or not public: {0}")]
    NotShared(String),
}

/// Link handed to whoever the document is shared with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub share_url: String,
    pub share_token: String,
}

/// URL-safe random token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Share a document, reusing its token if it already has one
pub fn create_shareable_link(store: &DocumentStore, document_id: &str) -> Result<ShareLink, SharingError> {
    let mut document = store.get_document(document_id)?;

    let share_token = match &document.share_token {
        Some(token) => token.clone(),
        None => generate_token(),
    };
    document.share_token = Some(share_token.clone());
    document.is_public = true;
    store.update_document(&document)?;

    info!(id = %document_id, "Document shared");
    Ok(ShareLink {
        share_url: format!("/shared/{}", share_token),
        share_token,
    })
}

/// Look up a public document by share token
pub fn get_document_by_share_token(
    store: &DocumentStore,
    share_token: &str,
) -> Result<Option<Document>, SharingError> {
    let found = store.list_documents()?
        .into_iter()
        .find(|d| d.is_public && d.share_token.as_deref() == Some(share_token));
    Ok(found)
}

/// Make a document private again. The token is kept for re-sharing.
pub fn revoke_share_access(store: &DocumentStore, document_id: &str) -> Result<(), SharingError> {
    let mut document = store.get_document(document_id)?;
    document.is_public = false;
    store.update_document(&document)?;
    info!(id = %document_id, "Share access revoked");
    Ok(())
}

/// Open a chat session on a document
pub fn create_chat_session(store: &DocumentStore, document_id: &str) -> Result<ChatSession, SharingError> {
    // Fails with NotFound for unknown documents
    store.get_document(document_id)?;

    let now = Utc::now();
    let session = ChatSession {
        id: Ulid::new().to_string(),
        document_id: document_id.to_string(),
        session_token: generate_token(),
        created_at: now,
        last_activity: now,
    };
    store.insert_session(session.clone())?;
    Ok(session)
}

pub fn get_chat_session(store: &DocumentStore, session_token: &str) -> Result<Option<ChatSession>, SharingError> {
    Ok(store.find_session(session_token)?)
}

/// Bump a session's last activity time
pub fn touch_chat_session(store: &DocumentStore, session_token: &str) -> Result<Option<ChatSession>, SharingError> {
    Ok(store.update_session(session_token, |s| s.last_activity = Utc::now())?)
}

/// Resolve a session token to its session and public document.
///
/// Records activity on success.
pub fn resolve_shared_session(
    store: &DocumentStore,
    session_token: &str,
) -> Result<(ChatSession, Document), SharingError> {
    let session = store.find_session(session_token)?.ok_or(SharingError::InvalidSession)?;

    let document = match store.get_document(&session.document_id) {
        Ok(d) if d.is_public => d,
        Ok(_) | Err(StoreError::NotFound(_)) => {
            return Err(SharingError::NotShared(session.document_id));
        }
        Err(e) => return Err(e.into()),
    };

    let session = touch_chat_session(store, session_token)?.unwrap_or(session);
    Ok((session, document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_generate_token() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_share_link_reuses_token() {
        let (_dir, store) = open_temp();
        let document = store.create_document("Paper", None, &[]).unwrap();

        let first = create_shareable_link(&store, &document.id).unwrap();
        let second = create_shareable_link(&store, &document.id).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.share_url, format!("/shared/{}", first.share_token));
        assert!(store.get_document(&document.id).unwrap().is_public);
    }

    #[test]
    fn test_lookup_by_token_requires_public() {
        let (_dir, store) = open_temp();
        let document = store.create_document("Paper", None, &[]).unwrap();
        let link = create_shareable_link(&store, &document.id).unwrap();

        let found = get_document_by_share_token(&store, &link.share_token).unwrap();
        assert_eq!(found.map(|d| d.id), Some(document.id.clone()));

        revoke_share_access(&store, &document.id).unwrap();
        assert!(get_document_by_share_token(&store, &link.share_token).unwrap().is_none());

        // Sharing again restores the same link
        let again = create_shareable_link(&store, &document.id).unwrap();
        assert_eq!(again.share_token, link.share_token);
    }

    #[test]
    fn test_unknown_token() {
        let (_dir, store) = open_temp();
        assert!(get_document_by_share_token(&store, "nope").unwrap().is_none());
        assert!(get_chat_session(&store, "nope").unwrap().is_none());
        assert!(touch_chat_session(&store, "nope").unwrap().is_none());
    }

    #[test]
    fn test_share_missing_document() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            create_shareable_link(&store, "01MISSING"),
            Err(SharingError::Store(StoreError::NotFound(_)))
        ));
        assert!(create_chat_session(&store, "01MISSING").is_err());
    }

    #[test]
    fn test_session_lifecycle() {
        let (_dir, store) = open_temp();
        let document = store.create_document("Paper", None, &[]).unwrap();
        create_shareable_link(&store, &document.id).unwrap();

        let session = create_chat_session(&store, &document.id).unwrap();
        assert_eq!(get_chat_session(&store, &session.session_token).unwrap(), Some(session.clone()));

        let (resolved, shared_doc) = resolve_shared_session(&store, &session.session_token).unwrap();
        assert_eq!(resolved.id, session.id);
        assert!(resolved.last_activity >= session.last_activity);
        assert_eq!(shared_doc.id, document.id);
    }

    #[test]
    fn test_resolve_rejects_private_or_unknown() {
        let (_dir, store) = open_temp();
        let document = store.create_document("Private", None, &[]).unwrap();
        let session = create_chat_session(&store, &document.id).unwrap();

        assert!(matches!(
            resolve_shared_session(&store, &session.session_token),
            Err(SharingError::NotShared(_))
        ));
        assert!(matches!(
            resolve_shared_session(&store, "bogus"),
            Err(SharingError::InvalidSession)
        ));
    }
}
