//! store
//!
//! The storage engine boundary: three logical tables and transactional
//! batches of writes against them.
//!
//! # Tables
//!
//! - `repositories` - keyed by id (one record in practice)
//! - `branches` - keyed by id, unique index on name
//! - `commits` - keyed by id, indexed by branch and by parent (multi-valued)
//!
//! # Atomicity
//!
//! Every mutation goes through [`Backend::apply`] as a [`Batch`]. A batch is
//! validated as a whole before anything is applied; a batch that fails
//! validation, or that fails while being persisted, leaves every table
//! exactly as it was. Readers never observe half of a batch.
//!
//! # Backends
//!
//! - [`memory::MemoryBackend`] - indexed tables behind a mutex, with scripted
//!   failures for tests
//! - [`file::FileBackend`] - JSON records under `<root>/.folio/`, guarded by
//!   an exclusive [`lock::RepoLock`]
//!
//! # Example
//!
//! ```
//! use folio::core::schema::{Branch, Repository};
//! use folio::core::types::{BranchName, RepositoryId, UtcTimestamp};
//! use folio::store::{memory::MemoryBackend, Backend, Batch, Write};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryBackend::new();
//! let main = Branch::new(BranchName::main(), None);
//! let repo = Repository {
//!     id: RepositoryId::singleton(),
//!     name: "Main Repository".into(),
//!     created_at: UtcTimestamp::now(),
//!     active_branch: main.id.clone(),
//! };
//!
//! let batch = Batch::new()
//!     .with(Write::CreateRepository(repo))
//!     .with(Write::InsertBranch(main));
//! store.apply(batch).await.unwrap();
//!
//! assert!(store.branch_by_name(&BranchName::main()).await.unwrap().is_some());
//! # });
//! ```

pub mod file;
pub mod lock;
pub mod memory;
pub mod tables;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::schema::{Branch, Commit, Repository};
use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId};

pub use lock::{LockError, RepoLock};

/// Errors from the storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{table} record '{key}' already exists")]
    AlreadyExists { table: &'static str, key: String },

    #[error("{table} record '{key}' does not exist")]
    Missing { table: &'static str, key: String },

    #[error("branch name '{0}' is already in use")]
    DuplicateName(String),

    #[error("branch '{0}' cannot be renamed")]
    RenameUnsupported(String),

    #[error("corrupt record at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("store is closed")]
    Closed,

    #[error("injected failure: {0}")]
    InjectedFault(String),
}

/// A single mutation inside a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert the repository record. Fails if it exists.
    CreateRepository(Repository),
    /// Replace an existing repository record.
    UpdateRepository(Repository),
    /// Insert a branch. Fails on a duplicate id or name.
    InsertBranch(Branch),
    /// Replace an existing branch. The name cannot change.
    UpdateBranch(Branch),
    /// Delete an existing branch.
    DeleteBranch(BranchId),
    /// Insert an immutable commit. Fails if the id exists.
    InsertCommit(Commit),
}

impl Write {
    /// Short name of the write kind, for logs and scripted failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Write::CreateRepository(_) => "create_repository",
            Write::UpdateRepository(_) => "update_repository",
            Write::InsertBranch(_) => "insert_branch",
            Write::UpdateBranch(_) => "update_branch",
            Write::DeleteBranch(_) => "delete_branch",
            Write::InsertCommit(_) => "insert_commit",
        }
    }

    /// Whether this write touches the repository or branch tables.
    pub fn touches_refs(&self) -> bool {
        !matches!(self, Write::InsertCommit(_))
    }
}

/// An ordered, all-or-nothing group of writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write, builder style.
    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    /// Append a write.
    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    /// The writes in application order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Asynchronous access to the three tables.
///
/// Reads return owned records; commits are immutable, so a record read once
/// stays valid. All mutation goes through [`Backend::apply`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up the repository record.
    async fn repository(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError>;

    /// Look up a branch by id.
    async fn branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError>;

    /// Look up a branch through the unique name index.
    async fn branch_by_name(&self, name: &BranchName) -> Result<Option<Branch>, StoreError>;

    /// All branches, ordered by name.
    async fn branches(&self) -> Result<Vec<Branch>, StoreError>;

    /// Look up a commit by id.
    async fn commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError>;

    /// All commits, ordered by timestamp then id.
    async fn commits(&self) -> Result<Vec<Commit>, StoreError>;

    /// All commit ids, unordered.
    async fn commit_ids(&self) -> Result<Vec<CommitId>, StoreError>;

    /// Commits authored on a branch, ordered by timestamp then id.
    async fn commits_on_branch(&self, branch: &BranchId) -> Result<Vec<Commit>, StoreError>;

    /// Commits listing `id` among their parents.
    async fn children(&self, id: &CommitId) -> Result<Vec<CommitId>, StoreError>;

    /// Number of stored commits.
    async fn commit_count(&self) -> Result<usize, StoreError>;

    /// Apply a batch atomically.
    async fn apply(&self, batch: Batch) -> Result<(), StoreError>;
}
