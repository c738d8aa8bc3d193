//! core::branches
//!
//! The branch store: named, mutable pointers into the commit graph.
//!
//! # Invariants
//!
//! - Branch names are unique (exact, case-sensitive match)
//! - The `main` branch is never deleted
//! - The active branch is never deleted
//! - Renaming is not supported

use tracing::{debug, info};

use super::error::{Error, Result};
use super::schema::Branch;
use super::types::{BranchId, BranchName, CommitId};
use crate::store::{Backend, Batch, StoreError, Write};

/// Create, delete, look up and advance branches.
pub struct BranchStore<'a> {
    backend: &'a dyn Backend,
}

impl<'a> BranchStore<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Create a branch pointing at `head`.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if the name is blank or already in use.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::branches::BranchStore;
    /// use folio::core::error::Error;
    /// use folio::store::memory::MemoryBackend;
    ///
    /// # tokio_test::block_on(async {
    /// let backend = MemoryBackend::new();
    /// let branches = BranchStore::new(&backend);
    ///
    /// let draft = branches.create("draft", None).await.unwrap();
    /// assert_eq!(draft.head, None);
    /// assert!(matches!(branches.create("draft", None).await, Err(Error::Validation(_))));
    /// assert!(matches!(branches.create("", None).await, Err(Error::Validation(_))));
    /// # });
    /// ```
    pub async fn create(&self, name: &str, head: Option<CommitId>) -> Result<Branch> {
        let name = BranchName::new(name)?;
        if self.backend.branch_by_name(&name).await?.is_some() {
            return Err(Error::Validation(format!("branch '{name}' already exists")));
        }

        let branch = Branch::new(name, head);
        match self
            .backend
            .apply(Batch::new().with(Write::InsertBranch(branch.clone())))
            .await
        {
            Ok(()) => {}
            Err(StoreError::DuplicateName(name)) => {
                return Err(Error::Validation(format!("branch '{name}' already exists")))
            }
            Err(err) => return Err(err.into()),
        }

        info!(branch = %branch.name, head = ?branch.head.as_ref().map(|h| h.as_str()), "created branch");
        Ok(branch)
    }

    /// Delete a branch.
    ///
    /// # Errors
    ///
    /// - `Error::Conflict` if `id` is the active branch or the branch is `main`
    /// - `Error::NotFound` if the branch does not exist
    pub async fn delete(&self, id: &BranchId, active: &BranchId) -> Result<Branch> {
        if id == active {
            return Err(Error::Conflict("cannot delete the active branch".into()));
        }
        let branch = self.get(id).await?;
        if branch.name.is_main() {
            return Err(Error::Conflict(format!(
                "cannot delete the '{}' branch",
                branch.name
            )));
        }

        self.backend
            .apply(Batch::new().with(Write::DeleteBranch(branch.id.clone())))
            .await?;
        info!(branch = %branch.name, "deleted branch");
        Ok(branch)
    }

    /// Look up a branch that must exist.
    pub async fn get(&self, id: &BranchId) -> Result<Branch> {
        self.backend
            .branch(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("branch with id '{id}'")))
    }

    /// Look up a branch by name.
    pub async fn find_by_name(&self, name: &BranchName) -> Result<Option<Branch>> {
        Ok(self.backend.branch_by_name(name).await?)
    }

    /// Look up a branch by name; it must exist.
    pub async fn get_by_name(&self, name: &str) -> Result<Branch> {
        let name = BranchName::new(name)?;
        self.find_by_name(&name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("branch '{name}'")))
    }

    /// Every branch, ordered by name.
    pub async fn list(&self) -> Result<Vec<Branch>> {
        Ok(self.backend.branches().await?)
    }

    /// Point a branch at `head`.
    ///
    /// The caller guarantees `head` is a stored commit.
    pub async fn advance_head(&self, id: &BranchId, head: CommitId) -> Result<Branch> {
        let (branch, write) = self.advance_write(id, head).await?;
        self.backend.apply(Batch::new().with(write)).await?;
        Ok(branch)
    }

    /// The write that points a branch at `head`, for use in a larger batch.
    pub async fn advance_write(&self, id: &BranchId, head: CommitId) -> Result<(Branch, Write)> {
        let mut branch = self.get(id).await?;
        debug!(branch = %branch.name, head = %head, "advancing head");
        branch.head = Some(head);
        Ok((branch.clone(), Write::UpdateBranch(branch)))
    }
}
