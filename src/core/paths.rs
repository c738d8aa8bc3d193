//! core::paths
//!
//! Centralized path routing for repository storage.
//!
//! # Storage Layout
//!
//! All repository data lives under `<root>/.folio/`:
//! - `config.toml` - Repository configuration
//! - `lock` - Exclusive single-writer lock file
//! - `refs.json` - Repository record and branches
//! - `commits/<id>.json` - One immutable record per commit
//!
//! The tracked document itself lives in the working root, next to `.folio/`.
//!
//! # Example
//!
//! ```
//! use folio::core::paths::FolioPaths;
//! use std::path::PathBuf;
//!
//! let paths = FolioPaths::new("/work/poster");
//! assert_eq!(paths.refs_path(), PathBuf::from("/work/poster/.folio/refs.json"));
//! assert_eq!(paths.config_path(), PathBuf::from("/work/poster/.folio/config.toml"));
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::CommitId;

/// Name of the data directory inside a working root.
pub const DATA_DIR: &str = ".folio";

/// Path routing for one repository.
///
/// No code outside this module joins `.folio` paths by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioPaths {
    /// The working root that contains `.folio/` and the document.
    pub root: PathBuf,
}

impl FolioPaths {
    /// Route paths for a repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the nearest enclosing repository, starting at `start`.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::paths::FolioPaths;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// std::fs::create_dir_all(dir.path().join(".folio")).unwrap();
    /// std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
    ///
    /// let found = FolioPaths::discover(&dir.path().join("a/b")).unwrap();
    /// assert_eq!(found.root, dir.path());
    /// ```
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(DATA_DIR).is_dir())
            .map(Self::new)
    }

    /// Whether a repository has been initialized at this root.
    pub fn exists(&self) -> bool {
        self.data_dir().is_dir()
    }

    /// `<root>/.folio`
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// `<root>/.folio/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// `<root>/.folio/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir().join("lock")
    }

    /// `<root>/.folio/refs.json`
    pub fn refs_path(&self) -> PathBuf {
        self.data_dir().join("refs.json")
    }

    /// `<root>/.folio/commits`
    pub fn commits_dir(&self) -> PathBuf {
        self.data_dir().join("commits")
    }

    /// `<root>/.folio/commits/<id>.json`
    pub fn commit_path(&self, id: &CommitId) -> PathBuf {
        self.commits_dir().join(format!("{}.json", id.as_str()))
    }

    /// Resolve a document path relative to the working root.
    pub fn document_path(&self, document: &Path) -> PathBuf {
        if document.is_absolute() {
            document.to_path_buf()
        } else {
            self.root.join(document)
        }
    }
}
