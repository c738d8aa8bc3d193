//! Integration tests for the workspace engine.
//!
//! These tests drive [`Workspace`] end to end over the in-memory backend and
//! document, covering commit, switch, merge and history queries.

use serde_json::{json, Value};

use folio::core::delta::DeltaEngine;
use folio::core::error::Error;
use folio::core::merge::Side;
use folio::core::reconstruct::Reconstructor;
use folio::core::types::CommitId;
use folio::engine::document::MemoryDocument;
use folio::engine::{MergeOutcome, Settings, Workspace};
use folio::store::memory::{FailOn, MemoryBackend};
use folio::store::Backend;

// =============================================================================
// Test Fixtures
// =============================================================================

/// A workspace plus handles to its backend and document.
struct Fixture {
    ws: Workspace,
    backend: MemoryBackend,
    doc: MemoryDocument,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    async fn with_settings(settings: Settings) -> Self {
        let backend = MemoryBackend::new();
        let doc = MemoryDocument::default();
        let ws = Workspace::in_memory(backend.clone(), doc.clone()).with_settings(settings);
        ws.initialize().await.expect("initialize");
        Self { ws, backend, doc }
    }

    /// Set the document and commit it; the commit must be created.
    async fn commit(&self, state: Value, message: &str) -> CommitId {
        self.doc.set(state);
        self.ws
            .commit(message)
            .await
            .expect("commit")
            .expect("document changed")
            .id
    }

    async fn head(&self, branch: &str) -> Option<CommitId> {
        self.ws
            .branches()
            .await
            .unwrap()
            .into_iter()
            .find(|b| b.name.as_str() == branch)
            .and_then(|b| b.head)
    }
}

// =============================================================================
// Commit and reconstruction
// =============================================================================

mod commits {
    use super::*;

    #[tokio::test]
    async fn every_commit_reconstructs_exactly() {
        let f = Fixture::new().await;
        let states = vec![
            json!({"children": []}),
            json!({"children": [{"id": "a", "props": {"x": 1, "fill": "#fff"}}]}),
            json!({"children": [{"id": "a", "props": {"x": 2}}, {"id": "b", "text": "héllo"}]}),
            json!({"children": [{"id": "b", "text": "héllo", "tags": [null, true, 1.5]}]}),
            json!({"title": "renamed", "children": []}),
        ];

        let mut ids = Vec::new();
        for (i, state) in states.iter().enumerate() {
            ids.push(f.commit(state.clone(), &format!("v{i}")).await);
        }

        for (id, expected) in ids.iter().zip(&states) {
            assert_eq!(&f.ws.state_at(id).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn first_commit_is_a_root_snapshot() {
        let f = Fixture::new().await;
        f.doc.set(json!({"children": [1]}));
        let root = f.ws.commit("first").await.unwrap().unwrap();
        assert!(root.is_snapshot);
        assert!(root.is_root());

        let second = f.commit(json!({"children": [1, 2]}), "second").await;
        let second = f.ws.resolve_commit(second.as_str()).await.unwrap();
        assert!(!second.is_snapshot);
        assert_eq!(second.parents, vec![root.id]);
    }

    #[tokio::test]
    async fn unchanged_document_is_a_no_op() {
        let f = Fixture::new().await;
        f.commit(json!({"children": [1]}), "first").await;
        let batches = f.backend.applied_batches();

        assert!(f.ws.commit("again").await.unwrap().is_none());
        assert_eq!(f.backend.applied_batches(), batches);
        assert_eq!(f.backend.commit_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn blank_message_rejected() {
        let f = Fixture::new().await;
        assert!(matches!(f.ws.commit("  ").await, Err(Error::Validation(_))));
        assert_eq!(f.backend.commit_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_write_leaves_head_alone() {
        let f = Fixture::new().await;
        let first = f.commit(json!({"v": 1}), "first").await;

        let _ = f.backend.clone().fail_on(FailOn::UpdateBranch);
        f.doc.set(json!({"v": 2}));
        assert!(matches!(f.ws.commit("second").await, Err(Error::Storage(_))));

        assert_eq!(f.head("main").await, Some(first));
        assert_eq!(f.backend.commit_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn thumbnail_from_host_or_argument() {
        let f = Fixture::new().await;
        f.doc.set_thumbnail(Some("data:host".into()));
        f.doc.set(json!({"v": 1}));
        let a = f.ws.commit("a").await.unwrap().unwrap();
        assert_eq!(a.thumbnail.as_deref(), Some("data:host"));

        f.doc.set(json!({"v": 2}));
        let b = f
            .ws
            .commit_with_thumbnail("b", Some("data:explicit".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.thumbnail.as_deref(), Some("data:explicit"));
    }

    #[tokio::test]
    async fn snapshot_interval_bounds_delta_chains() {
        let f = Fixture::with_settings(Settings {
            snapshot_interval: 3,
            ..Settings::default()
        })
        .await;

        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(f.commit(json!({"n": i}), &format!("c{i}")).await);
        }

        let rebuild = Reconstructor::new(f.ws.backend(), DeltaEngine::default());
        for (i, id) in ids.iter().enumerate() {
            let depth = rebuild.delta_depth(id).await.unwrap();
            assert!(depth <= 2, "commit {i} replays {depth} deltas");
            assert_eq!(f.ws.state_at(id).await.unwrap(), json!({"n": i}));
        }

        // Forced snapshots keep their parent.
        let third = f.ws.resolve_commit(ids[3].as_str()).await.unwrap();
        assert!(third.is_snapshot);
        assert_eq!(third.parents, vec![ids[2].clone()]);
    }

    #[tokio::test]
    async fn snapshot_interval_applies_to_merge_commits() {
        let f = Fixture::with_settings(Settings {
            snapshot_interval: 3,
            ..Settings::default()
        })
        .await;
        f.commit(json!({"a": 0, "b": 0}), "root").await;
        f.ws.create_branch("side").await.unwrap();
        f.commit(json!({"a": 1, "b": 0}), "m1").await;
        let m2 = f.commit(json!({"a": 2, "b": 0}), "m2").await;
        f.ws.switch_branch("side").await.unwrap();
        let s1 = f.commit(json!({"a": 0, "b": 1}), "s1").await;
        f.ws.switch_branch("main").await.unwrap();

        let MergeOutcome::Merged { commit, state } = f.ws.merge("side", None).await.unwrap() else {
            panic!("expected a merge commit");
        };
        assert_eq!(state, json!({"a": 2, "b": 1}));
        assert!(commit.is_snapshot);
        assert_eq!(commit.parents, vec![m2, s1]);

        let rebuild = Reconstructor::new(f.ws.backend(), DeltaEngine::default());
        assert_eq!(rebuild.delta_depth(&commit.id).await.unwrap(), 0);
        assert_eq!(f.ws.state_at(&commit.id).await.unwrap(), state);
    }

    #[tokio::test]
    async fn missing_commit_breaks_history() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        let two = f.commit(json!({"v": 2}), "two").await;
        let three = f.commit(json!({"v": 3}), "three").await;

        f.backend.purge_commit(&two);

        assert!(matches!(
            f.ws.state_at(&three).await,
            Err(Error::BrokenHistory(_))
        ));
    }
}

// =============================================================================
// Branches
// =============================================================================

mod branches {
    use super::*;

    #[tokio::test]
    async fn new_branch_starts_at_active_head() {
        let f = Fixture::new().await;
        let head = f.commit(json!({"v": 1}), "one").await;

        let feature = f.ws.create_branch("feature").await.unwrap();
        assert_eq!(feature.head, Some(head));
        assert!(matches!(
            f.ws.create_branch("feature").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn switch_restores_branch_state() {
        let f = Fixture::new().await;
        f.commit(json!({"page": "home"}), "home").await;
        f.ws.create_branch("draft").await.unwrap();
        f.ws.switch_branch("draft").await.unwrap();
        f.commit(json!({"page": "draft"}), "draft").await;

        f.ws.switch_branch("main").await.unwrap();
        assert_eq!(f.doc.state(), json!({"page": "home"}));
        assert_eq!(f.ws.active_branch().await.unwrap().name.as_str(), "main");

        f.ws.switch_branch("draft").await.unwrap();
        assert_eq!(f.doc.state(), json!({"page": "draft"}));
    }

    #[tokio::test]
    async fn switch_to_empty_branch_loads_empty_document() {
        let f = Fixture::new().await;
        f.ws.create_branch("blank").await.unwrap();
        f.doc.set(json!({"children": [{"id": "scratch"}]}));

        f.ws.switch_branch("blank").await.unwrap();
        assert_eq!(f.doc.state(), json!({"children": []}));
    }

    #[tokio::test]
    async fn failed_restore_keeps_active_branch() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        f.ws.create_branch("other").await.unwrap();
        f.doc.fail_restores(true);

        assert!(matches!(
            f.ws.switch_branch("other").await,
            Err(Error::Host(_))
        ));
        assert_eq!(f.ws.active_branch().await.unwrap().name.as_str(), "main");
    }

    #[tokio::test]
    async fn deletion_guards() {
        let f = Fixture::new().await;
        f.ws.create_branch("spare").await.unwrap();
        f.ws.switch_branch("spare").await.unwrap();

        assert!(matches!(
            f.ws.delete_branch("spare").await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            f.ws.delete_branch("main").await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            f.ws.delete_branch("ghost").await,
            Err(Error::NotFound(_))
        ));

        f.ws.switch_branch("main").await.unwrap();
        f.ws.delete_branch("spare").await.unwrap();
        assert_eq!(f.ws.branches().await.unwrap().len(), 1);
    }
}

// =============================================================================
// Merges
// =============================================================================

mod merges {
    use super::*;

    #[tokio::test]
    async fn fast_forward_moves_head_without_commit() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        f.ws.create_branch("feature").await.unwrap();
        f.ws.switch_branch("feature").await.unwrap();
        let tip = f.commit(json!({"v": 2}), "two").await;
        f.ws.switch_branch("main").await.unwrap();
        let commits = f.backend.commit_count().await.unwrap();

        let outcome = f.ws.merge("feature", None).await.unwrap();
        assert!(matches!(&outcome, MergeOutcome::FastForward { head, .. } if *head == tip));
        assert_eq!(f.head("main").await, Some(tip));
        assert_eq!(f.doc.state(), json!({"v": 2}));
        assert_eq!(f.backend.commit_count().await.unwrap(), commits);
    }

    #[tokio::test]
    async fn merged_source_is_up_to_date() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        f.ws.create_branch("old").await.unwrap();
        f.commit(json!({"v": 2}), "two").await;

        assert_eq!(f.ws.merge("old", None).await.unwrap(), MergeOutcome::UpToDate);
    }

    #[tokio::test]
    async fn diverged_branches_merge_both_sides() {
        let f = Fixture::new().await;
        let base = f.commit(json!({"title": "poster", "children": []}), "base").await;
        f.ws.create_branch("logo").await.unwrap();
        let main_tip = f
            .commit(json!({"title": "poster v2", "children": []}), "retitle")
            .await;

        f.ws.switch_branch("logo").await.unwrap();
        let logo_tip = f
            .commit(json!({"title": "poster", "children": [{"id": "logo"}]}), "logo")
            .await;
        f.ws.switch_branch("main").await.unwrap();

        let expected = json!({"title": "poster v2", "children": [{"id": "logo"}]});
        let MergeOutcome::Merged { commit, state } = f.ws.merge("logo", None).await.unwrap() else {
            panic!("expected a merge commit");
        };
        assert_eq!(state, expected);
        assert_eq!(commit.parents, vec![main_tip.clone(), logo_tip]);
        assert_eq!(commit.message, "Merge branch 'logo' into 'main'");
        assert!(!commit.is_snapshot);
        assert_eq!(f.head("main").await, Some(commit.id.clone()));
        assert_eq!(f.doc.state(), expected);
        assert_eq!(f.ws.state_at(&commit.id).await.unwrap(), expected);

        let history: Vec<CommitId> = f
            .ws
            .history(None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(history, vec![commit.id, main_tip, base]);
    }

    #[tokio::test]
    async fn conflict_changes_nothing() {
        let f = Fixture::new().await;
        f.commit(json!({"color": "red"}), "base").await;
        f.ws.create_branch("blue").await.unwrap();
        let main_tip = f.commit(json!({"color": "green"}), "green").await;
        f.ws.switch_branch("blue").await.unwrap();
        f.commit(json!({"color": "blue"}), "blue").await;
        f.ws.switch_branch("main").await.unwrap();

        let commits = f.backend.commit_count().await.unwrap();
        let restores = f.doc.restore_count();

        let MergeOutcome::Conflict(conflict) = f.ws.merge("blue", Some("m")).await.unwrap() else {
            panic!("expected a conflict");
        };
        assert_eq!(conflict.side, Side::Target);
        assert_eq!(conflict.path.as_str(), "/color");

        assert_eq!(f.head("main").await, Some(main_tip));
        assert_eq!(f.backend.commit_count().await.unwrap(), commits);
        assert_eq!(f.doc.restore_count(), restores);
        assert_eq!(f.doc.state(), json!({"color": "green"}));
    }

    #[tokio::test]
    async fn deleting_different_children_is_a_conflict() {
        let f = Fixture::new().await;
        f.commit(json!({"children": ["A", "B"]}), "base").await;
        f.ws.create_branch("drop-b").await.unwrap();
        let main_tip = f.commit(json!({"children": ["B"]}), "drop A").await;
        f.ws.switch_branch("drop-b").await.unwrap();
        f.commit(json!({"children": ["A"]}), "drop B").await;
        f.ws.switch_branch("main").await.unwrap();
        let commits = f.backend.commit_count().await.unwrap();

        let outcome = f.ws.merge("drop-b", None).await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Conflict(_)), "got {outcome:?}");
        assert_eq!(f.head("main").await, Some(main_tip));
        assert_eq!(f.backend.commit_count().await.unwrap(), commits);
        assert_eq!(f.doc.state(), json!({"children": ["B"]}));
    }

    #[tokio::test]
    async fn identical_changes_merge_cleanly() {
        let f = Fixture::new().await;
        f.commit(json!({"a": 1, "b": 1}), "base").await;
        f.ws.create_branch("twin").await.unwrap();
        f.commit(json!({"a": 2, "b": 1}), "a on main").await;
        f.ws.switch_branch("twin").await.unwrap();
        f.commit(json!({"a": 2, "b": 3}), "a and b on twin").await;
        f.ws.switch_branch("main").await.unwrap();

        let outcome = f.ws.merge("twin", None).await.unwrap();
        assert!(
            matches!(&outcome, MergeOutcome::Merged { state, .. } if *state == json!({"a": 2, "b": 3}))
        );
    }

    #[tokio::test]
    async fn merge_preconditions() {
        let f = Fixture::new().await;
        f.ws.create_branch("empty").await.unwrap();
        assert!(matches!(
            f.ws.merge("empty", None).await,
            Err(Error::Validation(_))
        ));

        f.commit(json!({"v": 1}), "one").await;
        assert!(matches!(
            f.ws.merge("main", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            f.ws.merge("empty", None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            f.ws.merge("ghost", None).await,
            Err(Error::NotFound(_))
        ));
    }
}

// =============================================================================
// Queries
// =============================================================================

mod queries {
    use super::*;

    #[tokio::test]
    async fn status_tracks_dirty_document() {
        let f = Fixture::new().await;
        let status = f.ws.status().await.unwrap();
        assert!(status.head.is_none());
        assert!(!status.dirty);

        f.commit(json!({"v": 1}), "one").await;
        assert!(!f.ws.status().await.unwrap().dirty);

        f.doc.set(json!({"v": 2}));
        let status = f.ws.status().await.unwrap();
        assert!(status.dirty);
        assert_eq!(status.commit_count, 1);
        assert_eq!(status.branch_count, 1);
    }

    #[tokio::test]
    async fn compare_commits_and_live_document() {
        let f = Fixture::new().await;
        let one = f.commit(json!({"v": 1}), "one").await;
        let two = f.commit(json!({"v": 2}), "two").await;

        let between = f.ws.compare(&one, Some(&two)).await.unwrap();
        assert_eq!(between.from_state, json!({"v": 1}));
        assert_eq!(between.to_state, json!({"v": 2}));
        assert_eq!(between.ops.len(), 1);

        f.doc.set(json!({"v": 2, "w": true}));
        let live = f.ws.compare(&two, None).await.unwrap();
        assert_eq!(live.to, None);
        assert_eq!(live.to_state, json!({"v": 2, "w": true}));
        assert_eq!(live.ops.len(), 1);
    }

    #[tokio::test]
    async fn root_changes_add_everything() {
        let f = Fixture::new().await;
        f.doc.set(json!({"children": [], "title": "t"}));
        let root = f.ws.commit("root").await.unwrap().unwrap();
        let ops = f.ws.changes_in(&root).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path().as_str(), "/title");
    }

    #[tokio::test]
    async fn history_of_named_and_empty_branches() {
        let f = Fixture::new().await;
        f.ws.create_branch("empty").await.unwrap();
        f.commit(json!({"v": 1}), "one").await;
        f.commit(json!({"v": 2}), "two").await;

        let main: Vec<String> = f
            .ws
            .history(Some("main"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.message)
            .collect();
        assert_eq!(main, vec!["two", "one"]);
        assert!(f.ws.history(Some("empty")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn graph_covers_every_branch() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        f.ws.create_branch("side").await.unwrap();
        f.ws.switch_branch("side").await.unwrap();
        f.commit(json!({"v": 2}), "two").await;

        let view = f.ws.graph().await.unwrap();
        assert_eq!(view.nodes.len(), 2);
        assert_eq!(view.edges.len(), 1);
        let active: Vec<&str> = view
            .labels
            .iter()
            .filter(|l| l.active)
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(active, vec!["side"]);
    }

    #[tokio::test]
    async fn graph_of_uninitialized_store_is_empty() {
        let ws = Workspace::in_memory(MemoryBackend::new(), MemoryDocument::default());
        assert!(ws.graph().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn graph_surfaces_storage_errors() {
        let f = Fixture::new().await;
        f.commit(json!({"v": 1}), "one").await;
        let _ = f.backend.clone().fail_on(FailOn::ReadRepository);
        assert!(matches!(f.ws.graph().await, Err(Error::Storage(_))));
    }
}
