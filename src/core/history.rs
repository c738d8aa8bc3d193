//! core::history
//!
//! Read-only projections of the commit graph.
//!
//! - [`linear_history`] - first-parent history of one head, newest first
//! - [`all_commits`] - every commit, oldest first
//! - [`GraphView`] - nodes, every parent edge, and branch labels, for
//!   rendering the full graph

use std::collections::HashSet;

use serde::Serialize;

use super::error::{Error, Result};
use super::schema::Commit;
use super::types::{BranchId, BranchName, CommitId, UtcTimestamp};
use crate::store::Backend;

/// Ids on the first-parent chain of `head`, newest first.
///
/// # Errors
///
/// `Error::NotFound` if `head` does not exist, `Error::BrokenHistory` on a
/// dangling parent or a loop.
pub async fn first_parent_ids(backend: &dyn Backend, head: &CommitId) -> Result<Vec<CommitId>> {
    Ok(linear_history(backend, head)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect())
}

/// The first-parent history of `head`, newest first.
///
/// # Example
///
/// ```
/// use folio::core::history::linear_history;
/// use folio::engine::{document::MemoryDocument, Workspace};
/// use folio::store::memory::MemoryBackend;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let doc = MemoryDocument::new(json!({"children": []}));
/// let ws = Workspace::in_memory(MemoryBackend::new(), doc.clone());
/// ws.initialize().await.unwrap();
///
/// ws.commit("one").await.unwrap();
/// doc.set(json!({"children": [1]}));
/// let head = ws.commit("two").await.unwrap().unwrap();
///
/// let log = linear_history(ws.backend(), &head.id).await.unwrap();
/// let messages: Vec<_> = log.iter().map(|c| c.message.as_str()).collect();
/// assert_eq!(messages, ["two", "one"]);
/// # });
/// ```
pub async fn linear_history(backend: &dyn Backend, head: &CommitId) -> Result<Vec<Commit>> {
    let mut current = backend
        .commit(head)
        .await?
        .ok_or_else(|| Error::NotFound(format!("commit '{head}'")))?;
    let mut visited = HashSet::new();
    let mut history = Vec::new();

    loop {
        if !visited.insert(current.id.clone()) {
            return Err(Error::BrokenHistory(format!(
                "first-parent chain loops at commit '{}'",
                current.id
            )));
        }
        let parent_id = current.first_parent().cloned();
        history.push(current);

        let Some(parent_id) = parent_id else {
            return Ok(history);
        };
        current = backend.commit(&parent_id).await?.ok_or_else(|| {
            Error::BrokenHistory(format!("parent commit '{parent_id}' is missing"))
        })?;
    }
}

/// Every commit, ordered by timestamp then id.
pub async fn all_commits(backend: &dyn Backend) -> Result<Vec<Commit>> {
    Ok(backend.commits().await?)
}

/// A commit as a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: CommitId,
    pub summary: String,
    pub timestamp: UtcTimestamp,
    pub is_snapshot: bool,
    pub is_merge: bool,
}

/// A child-to-parent edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub child: CommitId,
    pub parent: CommitId,
    /// Whether this is the edge the child's payload is relative to.
    pub first_parent: bool,
}

/// A branch pointing into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchLabel {
    pub name: BranchName,
    pub head: CommitId,
    pub active: bool,
}

/// The whole commit graph, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphView {
    /// Nodes ordered by timestamp then id.
    pub nodes: Vec<GraphNode>,
    /// Edges to stored parents, in node order.
    pub edges: Vec<GraphEdge>,
    /// Labels for branches with a head, ordered by branch name.
    pub labels: Vec<BranchLabel>,
}

impl GraphView {
    /// Project the stored graph. `active` marks the active branch's label.
    pub async fn build(backend: &dyn Backend, active: Option<&BranchId>) -> Result<Self> {
        let commits = all_commits(backend).await?;
        let known: HashSet<&CommitId> = commits.iter().map(|c| &c.id).collect();

        let mut edges = Vec::new();
        for commit in &commits {
            for (i, parent) in commit.parents.iter().enumerate() {
                if known.contains(parent) {
                    edges.push(GraphEdge {
                        child: commit.id.clone(),
                        parent: parent.clone(),
                        first_parent: i == 0,
                    });
                }
            }
        }

        let labels = backend
            .branches()
            .await?
            .into_iter()
            .filter_map(|b| {
                let active = Some(&b.id) == active;
                b.head.map(|head| BranchLabel {
                    name: b.name,
                    head,
                    active,
                })
            })
            .collect();

        let nodes = commits
            .iter()
            .map(|c| GraphNode {
                id: c.id.clone(),
                summary: c.summary().to_string(),
                timestamp: c.timestamp,
                is_snapshot: c.is_snapshot,
                is_merge: c.is_merge(),
            })
            .collect();

        Ok(Self {
            nodes,
            edges,
            labels,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
