//! core::repository
//!
//! The repository store: lifecycle of the singleton repository record.
//!
//! # Initialization
//!
//! [`RepositoryStore::initialize`] is idempotent. The first call writes the
//! repository record and an empty `main` branch in a single batch, so either
//! both exist afterwards or neither does.

use tracing::info;

use super::error::{Error, Result};
use super::schema::{Branch, Repository};
use super::types::{BranchId, BranchName, RepositoryId, UtcTimestamp};
use crate::store::{Backend, Batch, Write};

/// Create and update the repository record.
pub struct RepositoryStore<'a> {
    backend: &'a dyn Backend,
    id: RepositoryId,
}

impl<'a> RepositoryStore<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            id: RepositoryId::singleton(),
        }
    }

    /// Return the repository, creating it with an empty `main` branch on
    /// first use.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::repository::RepositoryStore;
    /// use folio::store::memory::MemoryBackend;
    ///
    /// # tokio_test::block_on(async {
    /// let backend = MemoryBackend::new();
    /// let store = RepositoryStore::new(&backend);
    ///
    /// let first = store.initialize("Main Repository").await.unwrap();
    /// let again = store.initialize("ignored").await.unwrap();
    /// assert_eq!(first, again);
    /// # });
    /// ```
    pub async fn initialize(&self, name: &str) -> Result<Repository> {
        if let Some(existing) = self.backend.repository(&self.id).await? {
            return Ok(existing);
        }

        let main = Branch::new(BranchName::main(), None);
        let repo = Repository {
            id: self.id.clone(),
            name: name.to_string(),
            created_at: UtcTimestamp::now(),
            active_branch: main.id.clone(),
        };
        self.backend
            .apply(
                Batch::new()
                    .with(Write::CreateRepository(repo.clone()))
                    .with(Write::InsertBranch(main)),
            )
            .await?;

        info!(repository = %repo.name, "initialized repository");
        Ok(repo)
    }

    /// Whether the repository record exists.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.backend.repository(&self.id).await?.is_some())
    }

    /// Look up the repository record.
    pub async fn get(&self) -> Result<Repository> {
        self.backend
            .repository(&self.id)
            .await?
            .ok_or_else(|| Error::NotFound("repository has not been initialized".into()))
    }

    /// Point the repository at a different active branch.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the repository or the branch does not exist.
    pub async fn set_active_branch(&self, branch: &BranchId) -> Result<Repository> {
        let repo = self.with_active_branch(branch).await?;
        self.backend
            .apply(Batch::new().with(Write::UpdateRepository(repo.clone())))
            .await?;
        Ok(repo)
    }

    /// The repository record as it would be with `branch` active, for use in
    /// a larger batch.
    pub async fn with_active_branch(&self, branch: &BranchId) -> Result<Repository> {
        let mut repo = self.get().await?;
        if self.backend.branch(branch).await?.is_none() {
            return Err(Error::NotFound(format!("branch with id '{branch}'")));
        }
        repo.active_branch = branch.clone();
        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::branches::BranchStore;
    use crate::store::memory::{FailOn, MemoryBackend};

    #[tokio::test]
    async fn initialize_creates_empty_main() {
        let backend = MemoryBackend::new();
        let repo = RepositoryStore::new(&backend)
            .initialize("Main Repository")
            .await
            .unwrap();
        let main = BranchStore::new(&backend).get_by_name("main").await.unwrap();
        assert_eq!(repo.active_branch, main.id);
        assert_eq!(main.head, None);
    }

    #[tokio::test]
    async fn failed_initialize_leaves_nothing_behind() {
        let backend = MemoryBackend::new().fail_on(FailOn::InsertBranch);
        let store = RepositoryStore::new(&backend);
        assert!(store.initialize("r").await.is_err());
        assert!(!store.exists().await.unwrap());
        assert!(backend.branches().await.unwrap().is_empty());

        backend.clear_fail_on();
        store.initialize("r").await.unwrap();
        assert!(store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn get_before_initialize_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            RepositoryStore::new(&backend).get().await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_active_branch_requires_repository() {
        let backend = MemoryBackend::new();
        let branch = BranchStore::new(&backend).create("x", None).await.unwrap();
        assert!(matches!(
            RepositoryStore::new(&backend).set_active_branch(&branch.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_active_branch_switches_pointer() {
        let backend = MemoryBackend::new();
        let store = RepositoryStore::new(&backend);
        store.initialize("r").await.unwrap();
        let branch = BranchStore::new(&backend).create("x", None).await.unwrap();
        let repo = store.set_active_branch(&branch.id).await.unwrap();
        assert_eq!(repo.active_branch, branch.id);
        assert_eq!(store.get().await.unwrap().active_branch, branch.id);
    }
}
