//! store::memory
//!
//! In-memory backend for tests and embedding.
//!
//! Clones share the same tables, so a test can keep a handle to the backend
//! it hands to a workspace and inspect or damage the store afterwards.
//!
//! # Example
//!
//! ```
//! use folio::store::memory::{FailOn, MemoryBackend};
//! use folio::store::{Backend, Batch, Write};
//! use folio::core::schema::Branch;
//! use folio::core::types::BranchName;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryBackend::new().fail_on(FailOn::InsertBranch);
//! let batch = Batch::new().with(Write::InsertBranch(Branch::new(BranchName::main(), None)));
//!
//! assert!(store.apply(batch).await.is_err());
//! assert!(store.branches().await.unwrap().is_empty());
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::tables::Tables;
use super::{Backend, Batch, StoreError, Write};
use crate::core::schema::{Branch, Commit, Repository};
use crate::core::types::{BranchId, BranchName, CommitId, RepositoryId};

/// Which operations a [`MemoryBackend`] should refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Any batch containing a repository insert.
    CreateRepository,
    /// Any batch containing a repository update.
    UpdateRepository,
    /// Any batch containing a branch insert.
    InsertBranch,
    /// Any batch containing a branch update.
    UpdateBranch,
    /// Any batch containing a branch delete.
    DeleteBranch,
    /// Any batch containing a commit insert.
    InsertCommit,
    /// Every batch.
    AnyBatch,
    /// Reads of the repository record.
    ReadRepository,
}

impl FailOn {
    fn matches(self, write: &Write) -> bool {
        matches!(
            (self, write),
            (FailOn::AnyBatch, _)
                | (FailOn::CreateRepository, Write::CreateRepository(_))
                | (FailOn::UpdateRepository, Write::UpdateRepository(_))
                | (FailOn::InsertBranch, Write::InsertBranch(_))
                | (FailOn::UpdateBranch, Write::UpdateBranch(_))
                | (FailOn::DeleteBranch, Write::DeleteBranch(_))
                | (FailOn::InsertCommit, Write::InsertCommit(_))
        )
    }
}

/// Backend keeping every table in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: Tables,
    fail_on: Option<FailOn>,
    applied: usize,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse operations matching `fail_on` until cleared.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Stop refusing operations.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Number of batches applied successfully.
    pub fn applied_batches(&self) -> usize {
        self.lock().applied
    }

    /// Remove a commit record outright, leaving any references to it
    /// dangling. Used to simulate a damaged store.
    pub fn purge_commit(&self, id: &CommitId) -> Option<Commit> {
        self.lock().tables.commits.remove(id)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn repository(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError> {
        let inner = self.lock();
        if inner.fail_on == Some(FailOn::ReadRepository) {
            return Err(StoreError::InjectedFault("refusing repository read".into()));
        }
        Ok(inner.tables.refs.repositories.get(id).cloned())
    }

    async fn branch(&self, id: &BranchId) -> Result<Option<Branch>, StoreError> {
        Ok(self.lock().tables.refs.branches.get(id).cloned())
    }

    async fn branch_by_name(&self, name: &BranchName) -> Result<Option<Branch>, StoreError> {
        Ok(self.lock().tables.refs.branch_by_name(name).cloned())
    }

    async fn branches(&self) -> Result<Vec<Branch>, StoreError> {
        Ok(self.lock().tables.refs.branches_by_name())
    }

    async fn commit(&self, id: &CommitId) -> Result<Option<Commit>, StoreError> {
        Ok(self.lock().tables.commits.get(id).cloned())
    }

    async fn commits(&self) -> Result<Vec<Commit>, StoreError> {
        Ok(self.lock().tables.commits.sorted())
    }

    async fn commit_ids(&self) -> Result<Vec<CommitId>, StoreError> {
        Ok(self.lock().tables.commits.ids())
    }

    async fn commits_on_branch(&self, branch: &BranchId) -> Result<Vec<Commit>, StoreError> {
        Ok(self.lock().tables.commits.on_branch(branch))
    }

    async fn children(&self, id: &CommitId) -> Result<Vec<CommitId>, StoreError> {
        Ok(self.lock().tables.commits.children(id))
    }

    async fn commit_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock().tables.commits.len())
    }

    async fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(fail_on) = inner.fail_on {
            if let Some(write) = batch.writes().iter().find(|w| fail_on.matches(w)) {
                return Err(StoreError::InjectedFault(format!(
                    "refusing batch with {}",
                    write.kind()
                )));
            }
        }
        inner.tables.apply(batch)?;
        inner.applied += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UtcTimestamp;

    fn root_commit(branch: &BranchId) -> Commit {
        Commit {
            id: CommitId::generate(),
            branch_id: branch.clone(),
            message: "root".into(),
            author: "user".into(),
            timestamp: UtcTimestamp::now(),
            parents: vec![],
            is_snapshot: true,
            payload: vec![1],
            thumbnail: None,
        }
    }

    #[tokio::test]
    async fn clones_share_tables() {
        let store = MemoryBackend::new();
        let other = store.clone();
        let branch = Branch::new(BranchName::main(), None);
        store
            .apply(Batch::new().with(Write::InsertBranch(branch.clone())))
            .await
            .unwrap();
        assert_eq!(other.branch(&branch.id).await.unwrap(), Some(branch));
    }

    #[tokio::test]
    async fn fail_on_matches_only_its_write_kind() {
        let store = MemoryBackend::new().fail_on(FailOn::InsertCommit);
        let branch = Branch::new(BranchName::main(), None);
        store
            .apply(Batch::new().with(Write::InsertBranch(branch.clone())))
            .await
            .unwrap();
        let err = store
            .apply(Batch::new().with(Write::InsertCommit(root_commit(&branch.id))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InjectedFault(_)));
        assert_eq!(store.commit_count().await.unwrap(), 0);

        store.clear_fail_on();
        store
            .apply(Batch::new().with(Write::InsertCommit(root_commit(&branch.id))))
            .await
            .unwrap();
        assert_eq!(store.commit_count().await.unwrap(), 1);
        assert_eq!(store.applied_batches(), 2);
    }

    #[tokio::test]
    async fn branch_and_parent_indexes() {
        let store = MemoryBackend::new();
        let main = BranchId::generate();
        let side = BranchId::generate();
        let root = root_commit(&main);
        let mut left = root_commit(&main);
        left.parents = vec![root.id.clone()];
        let mut right = root_commit(&side);
        right.parents = vec![root.id.clone()];
        let mut join = root_commit(&main);
        join.parents = vec![left.id.clone(), right.id.clone()];
        let mut batch = Batch::new();
        for commit in [&root, &left, &right, &join] {
            batch.push(Write::InsertCommit(commit.clone()));
        }
        store.apply(batch).await.unwrap();

        let mut children = store.children(&root.id).await.unwrap();
        children.sort();
        let mut expected = vec![left.id.clone(), right.id.clone()];
        expected.sort();
        assert_eq!(children, expected);
        assert_eq!(store.children(&right.id).await.unwrap(), vec![join.id.clone()]);
        assert!(store.children(&join.id).await.unwrap().is_empty());

        let on_side: Vec<CommitId> = store
            .commits_on_branch(&side)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(on_side, vec![right.id]);
        assert_eq!(store.commits_on_branch(&main).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn repository_reads_can_be_refused() {
        let store = MemoryBackend::new().fail_on(FailOn::ReadRepository);
        assert!(matches!(
            store.repository(&RepositoryId::singleton()).await,
            Err(StoreError::InjectedFault(_))
        ));
        store
            .apply(Batch::new().with(Write::InsertBranch(Branch::new(BranchName::main(), None))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn purge_leaves_dangling_references() {
        let store = MemoryBackend::new();
        let branch = BranchId::generate();
        let root = root_commit(&branch);
        let mut child = root_commit(&branch);
        child.parents = vec![root.id.clone()];
        child.is_snapshot = false;
        store
            .apply(
                Batch::new()
                    .with(Write::InsertCommit(root.clone()))
                    .with(Write::InsertCommit(child.clone())),
            )
            .await
            .unwrap();

        assert!(store.purge_commit(&root.id).is_some());
        assert!(store.commit(&root.id).await.unwrap().is_none());
        let still_there = store.commit(&child.id).await.unwrap().unwrap();
        assert_eq!(still_there.first_parent(), Some(&root.id));
    }
}
