//! engine
//!
//! Orchestrates repository operations against a store and a live document.
//!
//! # Data Flow
//!
//! ```text
//! capture document -> resolve active head -> reconstruct base state
//!     -> diff and encode -> append commit + advance head (one batch)
//! ```
//!
//! Merges run the merge state machine first: resolve both heads, find the
//! common ancestor, then report up-to-date, fast-forward, or attempt a
//! three-way merge.
//!
//! # Invariants
//!
//! - A commit and the head advance that publishes it are one batch
//! - Whenever the document is replaced, it is replaced before any pointer
//!   moves; a failed restore leaves every pointer where it was
//! - A merge conflict changes nothing: no commit, no pointer, no document
//!
//! # Example
//!
//! ```
//! use folio::engine::{document::MemoryDocument, MergeOutcome, Workspace};
//! use folio::store::memory::MemoryBackend;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let doc = MemoryDocument::new(json!({"children": []}));
//! let ws = Workspace::in_memory(MemoryBackend::new(), doc.clone());
//! ws.initialize().await.unwrap();
//! ws.commit("blank canvas").await.unwrap();
//!
//! ws.create_branch("logo").await.unwrap();
//! ws.switch_branch("logo").await.unwrap();
//! doc.set(json!({"children": [{"id": "logo"}]}));
//! ws.commit("add logo").await.unwrap();
//!
//! ws.switch_branch("main").await.unwrap();
//! assert_eq!(doc.state(), json!({"children": []}));
//!
//! let outcome = ws.merge("logo", None).await.unwrap();
//! assert!(matches!(outcome, MergeOutcome::FastForward { .. }));
//! assert_eq!(doc.state(), json!({"children": [{"id": "logo"}]}));
//! # });
//! ```

pub mod document;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::branches::BranchStore;
use crate::core::config::{Config, DEFAULT_REPOSITORY_NAME};
use crate::core::delta::compress::DEFAULT_LEVEL;
use crate::core::delta::{empty_document, patch, DeltaEngine, Document, PatchOp};
use crate::core::error::{Error, Result};
use crate::core::history::{linear_history, GraphView};
use crate::core::merge::{self, MergeConflict, MergePlan};
use crate::core::objects::{NewCommit, ObjectStore};
use crate::core::reconstruct::Reconstructor;
use crate::core::repository::RepositoryStore;
use crate::core::schema::{Branch, Commit, Repository, DEFAULT_AUTHOR};
use crate::core::types::{BranchId, CommitId, StateDigest};
use crate::store::memory::MemoryBackend;
use crate::store::{Backend, Batch, Write};

use document::{DocumentHost, MemoryDocument};

/// Tunables for a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Author recorded on new commits.
    pub author: String,
    /// Name given to the repository at initialization.
    pub repository_name: String,
    /// Force a snapshot whenever the delta chain would reach this length.
    /// 0 stores snapshots only for root commits.
    pub snapshot_interval: u32,
    /// zstd level for new payloads.
    pub compression_level: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            author: DEFAULT_AUTHOR.to_string(),
            repository_name: DEFAULT_REPOSITORY_NAME.to_string(),
            snapshot_interval: 0,
            compression_level: DEFAULT_LEVEL,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            author: config.author().to_string(),
            repository_name: config.repository_name().to_string(),
            snapshot_interval: config.snapshot_interval(),
            compression_level: config.compression_level(),
        }
    }
}

/// Result of [`Workspace::merge`].
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Nothing to merge; no commit was created.
    UpToDate,
    /// The target branch moved to the source head; no commit was created.
    FastForward { head: CommitId, state: Document },
    /// A merge commit was created on the target branch.
    Merged { commit: Commit, state: Document },
    /// The merge was abandoned; nothing changed.
    Conflict(MergeConflict),
}

/// Snapshot of where the workspace stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub repository: Repository,
    pub active: Branch,
    pub head: Option<Commit>,
    /// Whether the live document differs from the active head.
    pub dirty: bool,
    /// Digest of the live document.
    pub digest: StateDigest,
    pub branch_count: usize,
    pub commit_count: usize,
}

/// Two states and the patch between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub from: CommitId,
    /// `None` when comparing against the live document.
    pub to: Option<CommitId>,
    pub from_state: Document,
    pub to_state: Document,
    pub ops: Vec<PatchOp>,
}

/// A repository bound to a live document.
pub struct Workspace {
    backend: Arc<dyn Backend>,
    host: Arc<dyn DocumentHost>,
    settings: Settings,
}

impl Workspace {
    pub fn new(backend: Arc<dyn Backend>, host: Arc<dyn DocumentHost>, settings: Settings) -> Self {
        Self {
            backend,
            host,
            settings,
        }
    }

    /// A workspace over in-memory parts with default settings.
    pub fn in_memory(backend: MemoryBackend, document: MemoryDocument) -> Self {
        Self::new(Arc::new(backend), Arc::new(document), Settings::default())
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    fn engine(&self) -> DeltaEngine {
        DeltaEngine::new(self.settings.compression_level)
    }

    fn objects(&self) -> ObjectStore<'_> {
        ObjectStore::new(self.backend(), self.engine())
    }

    fn branch_store(&self) -> BranchStore<'_> {
        BranchStore::new(self.backend())
    }

    fn repository(&self) -> RepositoryStore<'_> {
        RepositoryStore::new(self.backend())
    }

    fn reconstructor(&self) -> Reconstructor<'_> {
        Reconstructor::new(self.backend(), self.engine())
    }

    /// The repository record and its active branch.
    async fn active(&self) -> Result<(Repository, Branch)> {
        let repo = self.repository().get().await?;
        let branch = self.branch_store().get(&repo.active_branch).await?;
        Ok((repo, branch))
    }

    async fn state_of(&self, head: Option<&CommitId>) -> Result<Document> {
        match head {
            Some(id) => self.reconstructor().state_at(id).await,
            None => Ok(empty_document()),
        }
    }

    /// Create the repository on first use; return it unchanged afterwards.
    pub async fn initialize(&self) -> Result<Repository> {
        self.repository()
            .initialize(&self.settings.repository_name)
            .await
    }

    /// Where the workspace stands.
    pub async fn status(&self) -> Result<Status> {
        let (repository, active) = self.active().await?;
        let head = match &active.head {
            Some(id) => Some(self.objects().get(id).await?),
            None => None,
        };
        let live = self.host.capture().await?;
        let committed = self.state_of(active.head.as_ref()).await?;

        Ok(Status {
            dirty: live != committed,
            digest: StateDigest::compute(&live),
            branch_count: self.backend.branches().await?.len(),
            commit_count: self.backend.commit_count().await?,
            repository,
            active,
            head,
        })
    }

    /// Record the live document on the active branch.
    ///
    /// Returns `Ok(None)`, creating nothing, when the document matches the
    /// active head.
    pub async fn commit(&self, message: &str) -> Result<Option<Commit>> {
        self.commit_with_thumbnail(message, None).await
    }

    /// Like [`Workspace::commit`], with an explicit thumbnail instead of the
    /// host's.
    pub async fn commit_with_thumbnail(
        &self,
        message: &str,
        thumbnail: Option<String>,
    ) -> Result<Option<Commit>> {
        if message.trim().is_empty() {
            return Err(Error::Validation("commit message cannot be empty".into()));
        }
        let (_, branch) = self.active().await?;
        let state = self.host.capture().await?;
        let thumbnail = match thumbnail {
            Some(t) => Some(t),
            None => self.host.thumbnail().await?,
        };
        let engine = self.engine();

        let new = match &branch.head {
            None => NewCommit::snapshot(branch.id.clone(), message, engine.encode_snapshot(&state)?),
            Some(head) => {
                let rebuild = self.reconstructor();
                let base = rebuild.state_at(head).await?;
                let payload = engine.compute_delta(&base, &state)?;
                if payload.is_empty() {
                    info!(branch = %branch.name, "nothing changed since last commit");
                    return Ok(None);
                }
                self.child_commit(&rebuild, &branch.id, message, head, &state, payload)
                    .await?
            }
        }
        .with_author(self.settings.author.clone())
        .with_thumbnail(thumbnail);

        let Some(commit) = self.objects().prepare(new).await? else {
            return Ok(None);
        };
        self.publish(&commit, &branch).await?;

        info!(
            commit = %commit.id,
            branch = %branch.name,
            snapshot = commit.is_snapshot,
            bytes = commit.payload.len(),
            "committed"
        );
        Ok(Some(commit))
    }

    /// A commit on top of `head`: a delta, or a snapshot that keeps `head` as
    /// its parent once the delta chain would reach the snapshot interval.
    async fn child_commit(
        &self,
        rebuild: &Reconstructor<'_>,
        branch: &BranchId,
        message: impl Into<String>,
        head: &CommitId,
        state: &Document,
        payload: Vec<u8>,
    ) -> Result<NewCommit> {
        let depth = rebuild.delta_depth(head).await? + 1;
        let interval = self.settings.snapshot_interval as usize;
        if interval > 0 && depth >= interval {
            debug!(depth, interval, "delta chain limit reached, storing snapshot");
            let snapshot = self.engine().encode_snapshot(state)?;
            Ok(NewCommit::snapshot(branch.clone(), message, snapshot).with_parents(vec![head.clone()]))
        } else {
            Ok(NewCommit::delta(branch.clone(), message, head.clone(), payload))
        }
    }

    /// Store `commit` and point `branch` at it in one batch.
    async fn publish(&self, commit: &Commit, branch: &Branch) -> Result<()> {
        let (_, advance) = self
            .branch_store()
            .advance_write(&branch.id, commit.id.clone())
            .await?;
        self.backend
            .apply(
                Batch::new()
                    .with(Write::InsertCommit(commit.clone()))
                    .with(advance),
            )
            .await?;
        Ok(())
    }

    /// Create a branch at the active branch's head.
    pub async fn create_branch(&self, name: &str) -> Result<Branch> {
        let (_, active) = self.active().await?;
        self.branch_store().create(name, active.head).await
    }

    /// Delete a branch by name. Neither `main` nor the active branch can be
    /// deleted.
    pub async fn delete_branch(&self, name: &str) -> Result<Branch> {
        let repo = self.repository().get().await?;
        let branch = self.branch_store().get_by_name(name).await?;
        self.branch_store()
            .delete(&branch.id, &repo.active_branch)
            .await
    }

    /// Load a branch's head into the document and make it active.
    ///
    /// A branch without commits loads the empty document. Uncommitted
    /// changes in the document are discarded.
    pub async fn switch_branch(&self, name: &str) -> Result<Branch> {
        let target = self.branch_store().get_by_name(name).await?;
        let state = self.state_of(target.head.as_ref()).await?;
        self.host.restore(&state).await?;
        self.repository().set_active_branch(&target.id).await?;
        info!(branch = %target.name, "switched branch");
        Ok(target)
    }

    /// The branch commits and merges land on.
    pub async fn active_branch(&self) -> Result<Branch> {
        Ok(self.active().await?.1)
    }

    /// Every branch, ordered by name.
    pub async fn branches(&self) -> Result<Vec<Branch>> {
        self.branch_store().list().await
    }

    /// Merge the branch named `source` into the active branch.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if either branch has no commits or `source` is
    /// the active branch. A conflict is not an error; it is
    /// [`MergeOutcome::Conflict`].
    pub async fn merge(&self, source: &str, message: Option<&str>) -> Result<MergeOutcome> {
        let (_, target) = self.active().await?;
        let source = self.branch_store().get_by_name(source).await?;
        if source.id == target.id {
            return Err(Error::Validation(format!(
                "cannot merge branch '{}' into itself",
                source.name
            )));
        }
        let target_head = target.head.clone().ok_or_else(|| {
            Error::Validation(format!("branch '{}' has no commits", target.name))
        })?;
        let source_head = source.head.clone().ok_or_else(|| {
            Error::Validation(format!("branch '{}' has no commits", source.name))
        })?;

        match merge::plan(self.backend(), &target_head, &source_head).await? {
            MergePlan::UpToDate => {
                info!(source = %source.name, target = %target.name, "already up to date");
                Ok(MergeOutcome::UpToDate)
            }
            MergePlan::FastForward { to } => {
                let state = self.reconstructor().state_at(&to).await?;
                self.host.restore(&state).await?;
                self.branch_store().advance_head(&target.id, to.clone()).await?;
                info!(source = %source.name, target = %target.name, head = %to, "fast-forwarded");
                Ok(MergeOutcome::FastForward { head: to, state })
            }
            MergePlan::ThreeWay { ancestor } => {
                let rebuild = Reconstructor::memoized(self.backend(), self.engine());
                let base = rebuild.state_at(&ancestor).await?;
                let ours = rebuild.state_at(&target_head).await?;
                let theirs = rebuild.state_at(&source_head).await?;

                let merged = match merge::three_way(&base, &ours, &theirs) {
                    Ok(merged) => merged,
                    Err(conflict) => {
                        warn!(source = %source.name, target = %target.name, %conflict, "merge conflict");
                        return Ok(MergeOutcome::Conflict(conflict));
                    }
                };

                let payload = self.engine().compute_delta(&ours, &merged)?;
                if payload.is_empty() {
                    info!(source = %source.name, target = %target.name, "merge produced no changes");
                    return Ok(MergeOutcome::UpToDate);
                }
                let message = message
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Merge branch '{}' into '{}'", source.name, target.name));
                let new = self
                    .child_commit(&rebuild, &target.id, message, &target_head, &merged, payload)
                    .await?
                    .with_parents(vec![target_head, source_head])
                    .with_author(self.settings.author.clone());
                let Some(commit) = self.objects().prepare(new).await? else {
                    info!(source = %source.name, target = %target.name, "merge produced no changes");
                    return Ok(MergeOutcome::UpToDate);
                };

                self.host.restore(&merged).await?;
                self.publish(&commit, &target).await?;
                info!(commit = %commit.id, source = %source.name, target = %target.name, "merged");
                Ok(MergeOutcome::Merged {
                    commit,
                    state: merged,
                })
            }
        }
    }

    /// First-parent history of a branch (the active one by default),
    /// newest first.
    pub async fn history(&self, branch: Option<&str>) -> Result<Vec<Commit>> {
        let branch = match branch {
            Some(name) => self.branch_store().get_by_name(name).await?,
            None => self.active().await?.1,
        };
        match &branch.head {
            Some(head) => linear_history(self.backend(), head).await,
            None => Ok(Vec::new()),
        }
    }

    /// The whole commit graph.
    pub async fn graph(&self) -> Result<GraphView> {
        let active = match self.repository().get().await {
            Ok(repo) => Some(repo.active_branch),
            Err(Error::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        GraphView::build(self.backend(), active.as_ref()).await
    }

    /// The state at a commit.
    pub async fn state_at(&self, commit: &CommitId) -> Result<Document> {
        self.reconstructor().state_at(commit).await
    }

    /// Compare a commit with another commit, or with the live document.
    pub async fn compare(&self, from: &CommitId, to: Option<&CommitId>) -> Result<Comparison> {
        let rebuild = Reconstructor::memoized(self.backend(), self.engine());
        let from_state = rebuild.state_at(from).await?;
        let to_state = match to {
            Some(id) => rebuild.state_at(id).await?,
            None => self.host.capture().await?,
        };
        Ok(Comparison {
            from: from.clone(),
            to: to.cloned(),
            ops: patch::diff(&from_state, &to_state),
            from_state,
            to_state,
        })
    }

    /// The changes a commit introduced relative to its first parent.
    ///
    /// For a root commit, the whole state counts as added.
    pub async fn changes_in(&self, commit: &Commit) -> Result<Vec<PatchOp>> {
        let rebuild = Reconstructor::memoized(self.backend(), self.engine());
        let state = rebuild.state_at(&commit.id).await?;
        let base = match commit.first_parent() {
            Some(parent) => rebuild.state_at(parent).await?,
            None => empty_document(),
        };
        Ok(patch::diff(&base, &state))
    }

    /// Look up a commit by full id or unique prefix.
    pub async fn resolve_commit(&self, prefix: &str) -> Result<Commit> {
        self.objects().resolve(prefix).await
    }
}
