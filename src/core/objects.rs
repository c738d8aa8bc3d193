//! core::objects
//!
//! The object store: append-only, immutable commits.
//!
//! # Invariants
//!
//! - A commit is never modified or deleted once appended
//! - A root commit (no parents) is always a snapshot
//! - A non-snapshot commit's payload is a delta against `parents[0]`, which
//!   must already be stored
//! - A delta commit with an empty payload is never created; appending one
//!   reports "nothing changed" as `Ok(None)`

use tracing::debug;

use super::delta::{is_empty_payload, DeltaEngine};
use super::error::{Error, Result};
use super::schema::{Commit, DEFAULT_AUTHOR};
use super::types::{BranchId, CommitId, UtcTimestamp};
use crate::store::{Backend, Batch, Write};

/// A commit that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub branch_id: BranchId,
    pub message: String,
    pub author: String,
    /// Zero parents for a root, one for a normal commit, two for a merge.
    pub parents: Vec<CommitId>,
    pub is_snapshot: bool,
    pub payload: Vec<u8>,
    pub thumbnail: Option<String>,
}

impl NewCommit {
    /// A snapshot commit with the default author.
    pub fn snapshot(branch_id: BranchId, message: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            branch_id,
            message: message.into(),
            author: DEFAULT_AUTHOR.to_string(),
            parents: Vec::new(),
            is_snapshot: true,
            payload,
            thumbnail: None,
        }
    }

    /// A delta commit against `parent` with the default author.
    pub fn delta(
        branch_id: BranchId,
        message: impl Into<String>,
        parent: CommitId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            branch_id,
            message: message.into(),
            author: DEFAULT_AUTHOR.to_string(),
            parents: vec![parent],
            is_snapshot: false,
            payload,
            thumbnail: None,
        }
    }

    pub fn with_parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }
}

/// Append and look up commits.
pub struct ObjectStore<'a> {
    backend: &'a dyn Backend,
    engine: DeltaEngine,
}

impl<'a> ObjectStore<'a> {
    pub fn new(backend: &'a dyn Backend, engine: DeltaEngine) -> Self {
        Self { backend, engine }
    }

    /// The codec payloads are encoded with.
    pub fn engine(&self) -> DeltaEngine {
        self.engine
    }

    /// Validate a new commit and build its record without storing it.
    ///
    /// Returns `Ok(None)` for a delta commit with an empty payload.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if the message is blank, the branch does not
    /// exist, there are more than two parents, a parent is not stored, or a
    /// root commit is not a snapshot.
    pub async fn prepare(&self, new: NewCommit) -> Result<Option<Commit>> {
        if new.message.trim().is_empty() {
            return Err(Error::Validation("commit message cannot be empty".into()));
        }
        if self.backend.branch(&new.branch_id).await?.is_none() {
            return Err(Error::Validation(format!(
                "commit must belong to an existing branch, '{}' not found",
                new.branch_id
            )));
        }
        if new.parents.len() > 2 {
            return Err(Error::Validation(format!(
                "a commit has at most two parents, got {}",
                new.parents.len()
            )));
        }
        for parent in &new.parents {
            if self.backend.commit(parent).await?.is_none() {
                return Err(Error::Validation(format!(
                    "parent commit '{parent}' does not exist"
                )));
            }
        }
        if new.parents.is_empty() && !new.is_snapshot {
            return Err(Error::Validation("a root commit must be a snapshot".into()));
        }
        if !new.is_snapshot && is_empty_payload(&new.payload) {
            debug!(branch = %new.branch_id, "empty delta, nothing to commit");
            return Ok(None);
        }

        Ok(Some(Commit {
            id: CommitId::generate(),
            branch_id: new.branch_id,
            message: new.message,
            author: new.author,
            timestamp: UtcTimestamp::now(),
            parents: new.parents,
            is_snapshot: new.is_snapshot,
            payload: new.payload,
            thumbnail: new.thumbnail,
        }))
    }

    /// Validate and store a new commit.
    ///
    /// Returns `Ok(None)`, storing nothing, for a delta commit with an empty
    /// payload.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::delta::DeltaEngine;
    /// use folio::core::objects::{NewCommit, ObjectStore};
    /// use folio::core::repository::RepositoryStore;
    /// use folio::store::memory::MemoryBackend;
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let backend = MemoryBackend::new();
    /// let repo = RepositoryStore::new(&backend).initialize("demo").await.unwrap();
    /// let objects = ObjectStore::new(&backend, DeltaEngine::default());
    ///
    /// let payload = objects.engine().encode_snapshot(&json!({"children": []})).unwrap();
    /// let root = objects
    ///     .append(NewCommit::snapshot(repo.active_branch.clone(), "start", payload))
    ///     .await
    ///     .unwrap()
    ///     .unwrap();
    ///
    /// let unchanged = NewCommit::delta(repo.active_branch, "again", root.id, Vec::new());
    /// assert!(objects.append(unchanged).await.unwrap().is_none());
    /// # });
    /// ```
    pub async fn append(&self, new: NewCommit) -> Result<Option<Commit>> {
        let Some(commit) = self.prepare(new).await? else {
            return Ok(None);
        };
        self.backend
            .apply(Batch::new().with(Write::InsertCommit(commit.clone())))
            .await?;
        debug!(commit = %commit.id, snapshot = commit.is_snapshot, "appended commit");
        Ok(Some(commit))
    }

    /// Look up a commit.
    pub async fn find(&self, id: &CommitId) -> Result<Option<Commit>> {
        Ok(self.backend.commit(id).await?)
    }

    /// Look up a commit that must exist.
    pub async fn get(&self, id: &CommitId) -> Result<Commit> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("commit '{id}'")))
    }

    /// Every stored commit, ordered by timestamp then id.
    pub async fn all(&self) -> Result<Vec<Commit>> {
        Ok(self.backend.commits().await?)
    }

    /// Number of stored commits.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.backend.commit_count().await?)
    }

    /// Look up a commit by its full id or a unique id prefix.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for an empty or ambiguous prefix,
    /// `Error::NotFound` if nothing matches.
    pub async fn resolve(&self, prefix: &str) -> Result<Commit> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::Validation("commit id cannot be empty".into()));
        }
        if let Ok(id) = CommitId::new(prefix) {
            if let Some(commit) = self.find(&id).await? {
                return Ok(commit);
            }
        }

        let mut matches: Vec<CommitId> = self
            .backend
            .commit_ids()
            .await?
            .into_iter()
            .filter(|id| id.as_str().starts_with(prefix))
            .collect();
        match matches.len() {
            0 => Err(Error::NotFound(format!("commit '{prefix}'"))),
            1 => {
                let id = matches.remove(0);
                self.get(&id).await
            }
            n => Err(Error::Validation(format!(
                "commit id '{prefix}' is ambiguous ({n} matches)"
            ))),
        }
    }
}
