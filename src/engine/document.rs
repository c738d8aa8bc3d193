//! engine::document
//!
//! The boundary to whatever holds the live document.
//!
//! A [`DocumentHost`] hands out the current state, accepts a state to load
//! destructively, and optionally renders a thumbnail. The engine never
//! interprets a state beyond diffing and encoding it.
//!
//! # Hosts
//!
//! - [`JsonFileDocument`] - a JSON file on disk
//! - [`MemoryDocument`] - an in-memory value for tests and embedding

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::core::delta::{empty_document, Document};

/// Errors from a document host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to access document '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document '{path}' is not valid JSON: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("document host unavailable: {0}")]
    Unavailable(String),
}

/// Supplies and accepts document states.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// The current state of the live document.
    async fn capture(&self) -> Result<Document, HostError>;

    /// Replace the live document with `state`.
    async fn restore(&self, state: &Document) -> Result<(), HostError>;

    /// A small preview of the live document, if the host can render one.
    async fn thumbnail(&self) -> Result<Option<String>, HostError> {
        Ok(None)
    }
}

/// A document stored as a JSON file.
///
/// A missing file captures as the empty document. Restores are written
/// through a temp file and a rename.
///
/// # Example
///
/// ```
/// use folio::engine::document::{DocumentHost, JsonFileDocument};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let doc = JsonFileDocument::new(dir.path().join("doc.json"));
///
/// assert_eq!(doc.capture().await.unwrap(), json!({"children": []}));
/// doc.restore(&json!({"children": [{"id": "a"}]})).await.unwrap();
/// assert_eq!(doc.capture().await.unwrap(), json!({"children": [{"id": "a"}]}));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileDocument {
    path: PathBuf,
}

impl JsonFileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HostError {
        HostError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DocumentHost for JsonFileDocument {
    async fn capture(&self) -> Result<Document, HostError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(empty_document()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| HostError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    async fn restore(&self, state: &Document) -> Result<(), HostError> {
        let mut bytes = serde_json::to_vec_pretty(state)?;
        bytes.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "restored document");
        Ok(())
    }
}

/// An in-memory document. Clones share the same state.
///
/// # Example
///
/// ```
/// use folio::engine::document::{DocumentHost, MemoryDocument};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let doc = MemoryDocument::new(json!({"children": []}));
/// let handle = doc.clone();
///
/// doc.restore(&json!({"children": [1]})).await.unwrap();
/// assert_eq!(handle.state(), json!({"children": [1]}));
/// assert_eq!(handle.restore_count(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    inner: Arc<Mutex<MemoryDocumentInner>>,
}

#[derive(Debug)]
struct MemoryDocumentInner {
    state: Document,
    thumbnail: Option<String>,
    restores: usize,
    fail_restores: bool,
}

impl MemoryDocument {
    pub fn new(state: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryDocumentInner {
                state,
                thumbnail: None,
                restores: 0,
                fail_restores: false,
            })),
        }
    }

    /// Edit the live document, as a user would.
    pub fn set(&self, state: Document) {
        self.lock().state = state;
    }

    /// The live document.
    pub fn state(&self) -> Document {
        self.lock().state.clone()
    }

    /// Use `thumbnail` as the preview for following commits.
    pub fn set_thumbnail(&self, thumbnail: Option<String>) {
        self.lock().thumbnail = thumbnail;
    }

    /// Number of successful restores so far.
    pub fn restore_count(&self) -> usize {
        self.lock().restores
    }

    /// Make every restore fail until turned off again.
    pub fn fail_restores(&self, fail: bool) {
        self.lock().fail_restores = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryDocumentInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new(empty_document())
    }
}

#[async_trait]
impl DocumentHost for MemoryDocument {
    async fn capture(&self) -> Result<Document, HostError> {
        Ok(self.state())
    }

    async fn restore(&self, state: &Document) -> Result<(), HostError> {
        let mut inner = self.lock();
        if inner.fail_restores {
            return Err(HostError::Unavailable("restore refused".into()));
        }
        inner.state = state.clone();
        inner.restores += 1;
        Ok(())
    }

    async fn thumbnail(&self) -> Result<Option<String>, HostError> {
        Ok(self.lock().thumbnail.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();
        let doc = JsonFileDocument::new(&path);
        assert!(matches!(doc.capture().await, Err(HostError::Parse { .. })));
    }

    #[tokio::test]
    async fn restore_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let doc = JsonFileDocument::new(dir.path().join("nested/dir/doc.json"));
        doc.restore(&json!({"a": 1})).await.unwrap();
        assert_eq!(doc.capture().await.unwrap(), json!({"a": 1}));
        assert_eq!(doc.thumbnail().await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_document_can_refuse_restores() {
        let doc = MemoryDocument::default();
        doc.fail_restores(true);
        assert!(doc.restore(&json!({"x": 1})).await.is_err());
        assert_eq!(doc.state(), json!({"children": []}));
        assert_eq!(doc.restore_count(), 0);
    }

    #[tokio::test]
    async fn memory_document_thumbnail() {
        let doc = MemoryDocument::default();
        doc.set_thumbnail(Some("data:image/png;base64,AA".into()));
        assert_eq!(
            doc.thumbnail().await.unwrap().as_deref(),
            Some("data:image/png;base64,AA")
        );
    }
}
