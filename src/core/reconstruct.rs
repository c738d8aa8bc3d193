//! core::reconstruct
//!
//! Rebuild the full document state at any commit.
//!
//! # Algorithm
//!
//! Starting at the target, follow `parents[0]` until a snapshot is reached,
//! collecting the delta commits on the way. Decode the snapshot, then replay
//! the collected deltas oldest first.
//!
//! # Failure Modes
//!
//! - `Error::NotFound` - the target commit does not exist
//! - `Error::BrokenHistory` - a parent is missing, a delta commit has no
//!   parent, or the first-parent chain loops
//! - `Error::CorruptDelta` - a payload does not decode or does not apply
//!
//! # Memoization
//!
//! A [`Reconstructor::memoized`] instance caches every state it builds, keyed
//! by commit id. Commits are immutable, so cached states never go stale.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::debug;

use super::delta::{DeltaEngine, Document};
use super::error::{Error, Result};
use super::schema::Commit;
use super::types::CommitId;
use crate::store::Backend;

/// Materializes document states from the commit graph.
pub struct Reconstructor<'a> {
    backend: &'a dyn Backend,
    engine: DeltaEngine,
    memo: Option<Mutex<HashMap<CommitId, Document>>>,
}

impl<'a> Reconstructor<'a> {
    /// A reconstructor that replays the full chain on every call.
    pub fn new(backend: &'a dyn Backend, engine: DeltaEngine) -> Self {
        Self {
            backend,
            engine,
            memo: None,
        }
    }

    /// A reconstructor that caches every state it builds.
    pub fn memoized(backend: &'a dyn Backend, engine: DeltaEngine) -> Self {
        Self {
            backend,
            engine,
            memo: Some(Mutex::new(HashMap::new())),
        }
    }

    /// The full state at commit `id`.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::delta::DeltaEngine;
    /// use folio::core::objects::{NewCommit, ObjectStore};
    /// use folio::core::reconstruct::Reconstructor;
    /// use folio::core::repository::RepositoryStore;
    /// use folio::store::memory::MemoryBackend;
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let backend = MemoryBackend::new();
    /// let branch = RepositoryStore::new(&backend).initialize("r").await.unwrap().active_branch;
    /// let engine = DeltaEngine::default();
    /// let objects = ObjectStore::new(&backend, engine);
    ///
    /// let v1 = json!({"children": [{"id": "a"}]});
    /// let v2 = json!({"children": [{"id": "a"}, {"id": "b"}]});
    /// let root = objects
    ///     .append(NewCommit::snapshot(branch.clone(), "v1", engine.encode_snapshot(&v1).unwrap()))
    ///     .await.unwrap().unwrap();
    /// let next = objects
    ///     .append(NewCommit::delta(branch, "v2", root.id.clone(), engine.compute_delta(&v1, &v2).unwrap()))
    ///     .await.unwrap().unwrap();
    ///
    /// let rebuild = Reconstructor::new(&backend, engine);
    /// assert_eq!(rebuild.state_at(&root.id).await.unwrap(), v1);
    /// assert_eq!(rebuild.state_at(&next.id).await.unwrap(), v2);
    /// # });
    /// ```
    pub async fn state_at(&self, id: &CommitId) -> Result<Document> {
        if let Some(state) = self.cached(id) {
            return Ok(state);
        }

        let target = self.load(id).await?;
        let (mut state, pending) = self.walk_to_base(target).await?;

        let depth = pending.len();
        for commit in pending.iter().rev() {
            state = self
                .engine
                .apply_delta(&state, &commit.payload)
                .map_err(|source| Error::CorruptDelta {
                    commit: commit.id.clone(),
                    source,
                })?;
            self.remember(&commit.id, &state);
        }

        debug!(commit = %id, depth, "reconstructed state");
        Ok(state)
    }

    /// Number of deltas between `id` and the nearest snapshot below it.
    ///
    /// A snapshot has depth 0.
    pub async fn delta_depth(&self, id: &CommitId) -> Result<usize> {
        let mut current = self.load(id).await?;
        let mut visited = HashSet::new();
        let mut depth = 0;
        while !current.is_snapshot {
            if !visited.insert(current.id.clone()) {
                return Err(cycle(&current.id));
            }
            current = self.parent_of(&current).await?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Follow first parents down to a snapshot or a cached state.
    ///
    /// Returns the base state and the delta commits above it, newest first.
    async fn walk_to_base(&self, target: Commit) -> Result<(Document, Vec<Commit>)> {
        let mut visited = HashSet::new();
        let mut pending = Vec::new();
        let mut current = target;

        loop {
            if !visited.insert(current.id.clone()) {
                return Err(cycle(&current.id));
            }
            if let Some(state) = self.cached(&current.id) {
                return Ok((state, pending));
            }
            if current.is_snapshot {
                let state = self
                    .engine
                    .decode_snapshot(&current.payload)
                    .map_err(|source| Error::CorruptDelta {
                        commit: current.id.clone(),
                        source,
                    })?;
                self.remember(&current.id, &state);
                return Ok((state, pending));
            }
            let parent = self.parent_of(&current).await?;
            pending.push(current);
            current = parent;
        }
    }

    async fn load(&self, id: &CommitId) -> Result<Commit> {
        self.backend
            .commit(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("commit '{id}'")))
    }

    async fn parent_of(&self, commit: &Commit) -> Result<Commit> {
        let parent_id = commit.first_parent().ok_or_else(|| {
            Error::BrokenHistory(format!(
                "commit '{}' is not a snapshot and has no parent",
                commit.id
            ))
        })?;
        self.backend.commit(parent_id).await?.ok_or_else(|| {
            Error::BrokenHistory(format!(
                "commit '{}' references missing parent '{}'",
                commit.id, parent_id
            ))
        })
    }

    fn cached(&self, id: &CommitId) -> Option<Document> {
        let memo = self.memo.as_ref()?;
        let memo = memo.lock().unwrap_or_else(|p| p.into_inner());
        memo.get(id).cloned()
    }

    fn remember(&self, id: &CommitId, state: &Document) {
        if let Some(memo) = &self.memo {
            memo.lock()
                .unwrap_or_else(|p| p.into_inner())
                .insert(id.clone(), state.clone());
        }
    }
}

fn cycle(id: &CommitId) -> Error {
    Error::BrokenHistory(format!("first-parent chain loops at commit '{id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BranchId, UtcTimestamp};
    use crate::store::memory::MemoryBackend;
    use crate::store::{Batch, Write};
    use serde_json::json;

    fn record(id: &str, parent: Option<&str>, is_snapshot: bool, payload: Vec<u8>) -> Commit {
        Commit {
            id: CommitId::new(id).unwrap(),
            branch_id: BranchId::new("b").unwrap(),
            message: id.into(),
            author: "user".into(),
            timestamp: UtcTimestamp::now(),
            parents: parent.map(|p| CommitId::new(p).unwrap()).into_iter().collect(),
            is_snapshot,
            payload,
            thumbnail: None,
        }
    }

    /// root -> c1 -> c2 -> c3, each delta bumping `n`.
    async fn chain(backend: &MemoryBackend) -> Vec<Document> {
        let engine = DeltaEngine::default();
        let states: Vec<Document> = (0..4).map(|n| json!({"children": [], "n": n})).collect();
        let mut batch = Batch::new().with(Write::InsertCommit(record(
            "root",
            None,
            true,
            engine.encode_snapshot(&states[0]).unwrap(),
        )));
        let ids = ["root", "c1", "c2", "c3"];
        for i in 1..4 {
            batch.push(Write::InsertCommit(record(
                ids[i],
                Some(ids[i - 1]),
                false,
                engine.compute_delta(&states[i - 1], &states[i]).unwrap(),
            )));
        }
        backend.apply(batch).await.unwrap();
        states
    }

    fn id(s: &str) -> CommitId {
        CommitId::new(s).unwrap()
    }

    #[tokio::test]
    async fn replays_chain_oldest_first() {
        let backend = MemoryBackend::new();
        let states = chain(&backend).await;
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        assert_eq!(rebuild.state_at(&id("c3")).await.unwrap(), states[3]);
        assert_eq!(rebuild.delta_depth(&id("c3")).await.unwrap(), 3);
        assert_eq!(rebuild.delta_depth(&id("root")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memoized_results_match() {
        let backend = MemoryBackend::new();
        let states = chain(&backend).await;
        let rebuild = Reconstructor::memoized(&backend, DeltaEngine::default());
        assert_eq!(rebuild.state_at(&id("c2")).await.unwrap(), states[2]);
        assert_eq!(rebuild.state_at(&id("c3")).await.unwrap(), states[3]);
        assert_eq!(rebuild.state_at(&id("c1")).await.unwrap(), states[1]);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let backend = MemoryBackend::new();
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        assert!(matches!(
            rebuild.state_at(&id("nope")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_parent_is_broken_history() {
        let backend = MemoryBackend::new();
        chain(&backend).await;
        backend.purge_commit(&id("c1"));
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        for descendant in ["c2", "c3"] {
            assert!(matches!(
                rebuild.state_at(&id(descendant)).await,
                Err(Error::BrokenHistory(_))
            ));
        }
    }

    #[tokio::test]
    async fn parentless_delta_is_broken_history() {
        let backend = MemoryBackend::new();
        backend
            .apply(Batch::new().with(Write::InsertCommit(record("orphan", None, false, vec![1]))))
            .await
            .unwrap();
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        assert!(matches!(
            rebuild.state_at(&id("orphan")).await,
            Err(Error::BrokenHistory(_))
        ));
    }

    #[tokio::test]
    async fn cycle_is_broken_history() {
        let backend = MemoryBackend::new();
        backend
            .apply(
                Batch::new()
                    .with(Write::InsertCommit(record("x", Some("y"), false, vec![1])))
                    .with(Write::InsertCommit(record("y", Some("x"), false, vec![1]))),
            )
            .await
            .unwrap();
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        assert!(matches!(
            rebuild.state_at(&id("x")).await,
            Err(Error::BrokenHistory(msg)) if msg.contains("loops")
        ));
        assert!(rebuild.delta_depth(&id("x")).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_payload_names_commit() {
        let backend = MemoryBackend::new();
        chain(&backend).await;
        backend
            .apply(Batch::new().with(Write::InsertCommit(record(
                "bad",
                Some("c3"),
                false,
                b"not zstd".to_vec(),
            ))))
            .await
            .unwrap();
        let rebuild = Reconstructor::new(&backend, DeltaEngine::default());
        match rebuild.state_at(&id("bad")).await {
            Err(Error::CorruptDelta { commit, .. }) => assert_eq!(commit, id("bad")),
            other => panic!("expected corrupt delta, got {other:?}"),
        }
    }
}
