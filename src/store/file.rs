//! store::file
//!
//! Durable backend storing JSON records under `<root>/.folio/`.
//!
//! # Layout
//!
//! - `refs.json` - the repository record and every branch, rewritten
//!   atomically (temp file, fsync, rename) whenever a batch touches them
//! - `commits/<id>.json` - one record per commit, written once and never
//!   modified
//!
//! Commit records of a batch are written before `refs.json`, so a pointer
//! on disk never references a commit that is not there. A failure between
//! the two leaves an unreferenced commit record behind, which is harmless.
//!
//! # Lifecycle
//!
//! [`FileBackend::open`] takes the exclusive [`RepoLock`], loads and indexes
//! every record, and serves reads from memory. [`FileBackend::close`] drops
//! the tables and the lock; any later call fails with `StoreError::Closed`.
//!
//! # Example
//!
//! ```
//! use folio::core::paths::FolioPaths;
//! use folio::core::schema::Branch;
//! use folio::core::types::BranchName;
//! use folio::store::file::FileBackend;
//! use folio::store::{Backend, Batch, Write};
//!
//! # tokio_test::block_on(async {
//! let dir = tempfile::tempdir().unwrap();
//! let paths = FolioPaths::new(dir.path());
//!
//! let store = FileBackend::open(&paths).await.unwrap();
//! let main = Branch::new(BranchName::main(), None);
//! store.apply(Batch::new().with(Write::InsertBranch(main.clone()))).await.unwrap();
//! store.close().await;
//!
//! let reopened = FileBackend::open(&paths).await.unwrap();
//! assert_eq!(reopened.branch(&main.id).await.unwrap(), Some(main));
//! # });
//! ```

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::lock::RepoLock;
use super::tables::{RefTables, Tables};
use super::{Backend, Batch, StoreError, Write};
use crate::core::paths::FolioPaths;
use crate::core::schema::{Branch, Commit, Repository};
use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId};

/// Kind tag of the refs file.
pub const REFS_KIND: &str = "folio.refs";

/// Current refs file schema version.
pub const REFS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RefsFile {
    #[serde(default = "refs_kind")]
    kind: String,
    #[serde(default = "refs_version")]
    schema_version: u32,
    #[serde(default)]
    repositories: Vec<Repository>,
    #[serde(default)]
    branches: Vec<Branch>,
}

fn refs_kind() -> String {
    REFS_KIND.to_string()
}

fn refs_version() -> u32 {
    REFS_SCHEMA_VERSION
}

impl RefsFile {
    fn from_tables(refs: &RefTables) -> Self {
        Self {
            kind: refs_kind(),
            schema_version: REFS_SCHEMA_VERSION,
            repositories: refs.repositories.values().cloned().collect(),
            branches: refs.branches_by_name(),
        }
    }
}

/// An open repository on disk.
#[derive(Debug)]
pub struct FileBackend {
    paths: FolioPaths,
    state: Mutex<Option<OpenState>>,
}

#[derive(Debug)]
struct OpenState {
    tables: Tables,
    _lock: RepoLock,
}

impl FileBackend {
    /// Open (creating if needed) the store rooted at `paths`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Lock` if another process has the repository open
    /// - `StoreError::Corrupt` if a record cannot be parsed
    /// - `StoreError::Io` on filesystem failures
    pub async fn open(paths: &FolioPaths) -> Result<Self, StoreError> {
        let lock = RepoLock::acquire(paths)?;
        tokio::fs::create_dir_all(paths.commits_dir()).await?;

        let refs = load_refs(&paths.refs_path()).await?;
        let mut tables = Tables {
            refs: RefTables::from_records(refs.repositories, refs.branches)?,
            ..Tables::default()
        };

        let mut entries = tokio::fs::read_dir(paths.commits_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let commit: Commit = read_record(&path).await?;
            if tables.commits.contains(&commit.id) {
                return Err(StoreError::Corrupt {
                    path,
                    message: format!("duplicate commit id {}", commit.id),
                });
            }
            tables.commits.insert(commit);
        }

        debug!(
            root = %paths.root.display(),
            branches = tables.refs.branches.len(),
            commits = tables.commits.len(),
            "opened file store"
        );

        Ok(Self {
            paths: paths.clone(),
            state: Mutex::new(Some(OpenState {
                tables,
                _lock: lock,
            })),
        })
    }

    /// Release the tables and the repository lock.
    pub async fn close(&self) {
        if self.state.lock().await.take().is_some() {
            debug!(root = %self.paths.root.display(), "closed file store");
        }
    }

    /// Paths of the open repository.
    pub fn paths(&self) -> &FolioPaths {
        &self.paths
    }

    async fn open_state(&self) -> Result<MutexGuard<'_, Option<OpenState>>, StoreError> {
        let guard = self.state.lock().await;
        if guard.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(guard)
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let guard = self.open_state().await?;
        match guard.as_ref() {
            Some(state) => Ok(f(&state.tables)),
            None => Err(StoreError::Closed),
        }
    }
}

async fn load_refs(path: &Path) -> Result<RefsFile, StoreError> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(RefsFile::from_tables(&RefTables::default()));
    }
    let refs: RefsFile = read_record(path).await?;
    if refs.kind != REFS_KIND {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            message: format!("unexpected kind '{}', expected '{}'", refs.kind, REFS_KIND),
        });
    }
    if refs.schema_version > REFS_SCHEMA_VERSION {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            message: format!(
                "unsupported schema version {}, supported: {}",
                refs.schema_version, REFS_SCHEMA_VERSION
            ),
        });
    }
    Ok(refs)
}

async fn read_record<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write `bytes` to `path` through a synced temp file and a rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    #[cfg(any(test, feature = "fault_injection"))]
    if fault_injection::should_crash() {
        return Err(StoreError::InjectedFault(format!(
            "simulated crash before writing {}",
            path.display()
        )));
    }

    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::File::open(&temp).await?.sync_all().await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}

#[async_trait]
impl Backend for FileBackend {
    async fn repository(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError> {
        self.read(|t| t.refs.repositories.get(id).cloned()).await
    }

    async fn branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError> {
        self.read(|t| t.refs.branches.get(id).cloned()).await
    }

    async fn branch_by_name(&self, name: &BranchName) -> Result<Option<Branch>, StoreError> {
        self.read(|t| t.refs.branch_by_name(name).cloned()).await
    }

    async fn branches(&self) -> Result<Vec<Branch>, StoreError> {
        self.read(|t| t.refs.branches_by_name()).await
    }

    async fn commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError> {
        self.read(|t| t.commits.get(id).cloned()).await
    }

    async fn commits(&self) -> Result<Vec<Commit>, StoreError> {
        self.read(|t| t.commits.sorted()).await
    }

    async fn commit_ids(&self) -> Result<Vec<CommitId>, StoreError> {
        self.read(|t| t.commits.ids()).await
    }

    async fn commits_on_branch(&self, branch: &BranchId) -> Result<Vec<Commit>, StoreError> {
        self.read(|t| t.commits.on_branch(branch)).await
    }

    async fn children(&self, id: &CommitId) -> Result<Vec<CommitId>, StoreError> {
        self.read(|t| t.commits.children(id)).await
    }

    async fn commit_count(&self) -> Result<usize, StoreError> {
        self.read(|t| t.commits.len()).await
    }

    async fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut guard = self.open_state().await?;
        let state = guard.as_mut().ok_or(StoreError::Closed)?;
        state.tables.validate(&batch)?;

        for write in batch.writes() {
            if let Write::InsertCommit(commit) = write {
                let path = self.paths.commit_path(&commit.id);
                if tokio::fs::try_exists(&path).await? {
                    return Err(StoreError::AlreadyExists {
                        table: "commits",
                        key: commit.id.to_string(),
                    });
                }
                let bytes = serde_json::to_vec_pretty(commit)?;
                write_atomic(&path, &bytes).await?;
            }
        }

        let refs = state.tables.stage_refs(&batch);
        if batch.writes().iter().any(Write::touches_refs) {
            let bytes = serde_json::to_vec_pretty(&RefsFile::from_tables(&refs))?;
            if let Err(err) = write_atomic(&self.paths.refs_path(), &bytes).await {
                warn!(error = %err, "failed to write refs; batch discarded");
                return Err(err);
            }
        }

        debug!(writes = batch.len(), "applied batch");
        state.tables.install(refs, batch);
        Ok(())
    }
}

/// Simulated crashes for testing the durability of batches.
///
/// # Usage
///
/// ```ignore
/// use folio::store::file::fault_injection;
///
/// // The second file write of this thread fails.
/// fault_injection::set_crash_after(2);
/// // ...
/// fault_injection::reset();
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    // Thread-local so parallel tests do not interfere.
    thread_local! {
        /// Fail the Nth file write. 0 disables.
        static CRASH_AFTER_WRITES: Cell<usize> = const { Cell::new(0) };

        static WRITE_COUNT: Cell<usize> = const { Cell::new(0) };
    }

    /// Fail the `n`th file write from now on this thread. 0 disables.
    pub fn set_crash_after(n: usize) {
        CRASH_AFTER_WRITES.with(|c| c.set(n));
        WRITE_COUNT.with(|c| c.set(0));
    }

    /// Count a write and report whether it should fail.
    pub fn should_crash() -> bool {
        CRASH_AFTER_WRITES.with(|threshold| {
            let threshold = threshold.get();
            if threshold == 0 {
                return false;
            }
            WRITE_COUNT.with(|count| {
                let next = count.get() + 1;
                count.set(next);
                next >= threshold
            })
        })
    }

    /// Disable crash simulation.
    pub fn reset() {
        CRASH_AFTER_WRITES.with(|c| c.set(0));
        WRITE_COUNT.with(|c| c.set(0));
    }

    /// Writes counted since the last reset.
    pub fn write_count() -> usize {
        WRITE_COUNT.with(|c| c.get())
    }
}
