//! core::merge
//!
//! Common-ancestor search, fast-forward detection and three-way merge.
//!
//! # Ancestor Search
//!
//! Like reconstruction, the search follows first parents only: the target
//! head's first-parent chain is collected into a set, then the source head's
//! chain is walked until it enters that set. In histories built from merges
//! of merges this may return an ancestor that is not the lowest one.
//!
//! # Three-Way Merge
//!
//! Both sides are diffed against the ancestor. The source patch is applied
//! to the ancestor first, then the target patch. Operations present in both
//! patches are applied once when they address object members only; array
//! operations are positional and always replayed. A target `Replace` whose
//! location already holds its new value is accepted. Any other target
//! operation that no longer fits after the source patch makes the whole
//! merge a [`MergeConflict`]; nothing is half-merged.
//!
//! # Example
//!
//! ```
//! use folio::core::merge::{three_way, Side};
//! use serde_json::json;
//!
//! let ancestor = json!({"title": "poster", "children": []});
//! let target = json!({"title": "poster v2", "children": []});
//! let source = json!({"title": "poster", "children": [{"id": "logo"}]});
//!
//! let merged = three_way(&ancestor, &target, &source).unwrap();
//! assert_eq!(merged, json!({"title": "poster v2", "children": [{"id": "logo"}]}));
//!
//! let conflict = three_way(&json!({"a": 1}), &json!({"a": 2}), &json!({"a": 3})).unwrap_err();
//! assert_eq!(conflict.side, Side::Target);
//! assert_eq!(conflict.path.as_str(), "/a");
//! ```

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::delta::patch::{self, PatchError, PatchOp};
use super::delta::{Document, Pointer};
use super::error::{Error, Result};
use super::history::first_parent_ids;
use super::types::CommitId;
use crate::store::Backend;

/// The first commit on `source`'s first-parent chain that is also on
/// `target`'s first-parent chain.
///
/// # Errors
///
/// `Error::NotFound` if either head is missing, `Error::BrokenHistory` if a
/// chain is damaged.
pub async fn find_common_ancestor(
    backend: &dyn Backend,
    target: &CommitId,
    source: &CommitId,
) -> Result<Option<CommitId>> {
    let target_chain: HashSet<CommitId> = first_parent_ids(backend, target)
        .await?
        .into_iter()
        .collect();
    let source_chain = first_parent_ids(backend, source).await?;
    Ok(source_chain
        .into_iter()
        .find(|id| target_chain.contains(id)))
}

/// What a merge of `source` into `target` has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePlan {
    /// The source is already contained in the target.
    UpToDate,
    /// The target is an ancestor of the source; move the target to `to`.
    FastForward { to: CommitId },
    /// Both sides changed since `ancestor`.
    ThreeWay { ancestor: CommitId },
}

/// Decide how to merge the `source` head into the `target` head.
///
/// # Errors
///
/// `Error::BrokenHistory` if the heads share no ancestor.
pub async fn plan(backend: &dyn Backend, target: &CommitId, source: &CommitId) -> Result<MergePlan> {
    if target == source {
        return Ok(MergePlan::UpToDate);
    }
    let ancestor = find_common_ancestor(backend, target, source)
        .await?
        .ok_or_else(|| {
            Error::BrokenHistory(format!(
                "commits '{target}' and '{source}' have no common ancestor"
            ))
        })?;
    debug!(%target, %source, %ancestor, "found merge base");

    Ok(if &ancestor == source {
        MergePlan::UpToDate
    } else if &ancestor == target {
        MergePlan::FastForward { to: source.clone() }
    } else {
        MergePlan::ThreeWay { ancestor }
    })
}

/// Which patch failed to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// A merge that cannot be completed automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    /// The patch whose application failed.
    pub side: Side,
    /// Where it failed.
    pub path: Pointer,
    /// Why it failed.
    pub reason: String,
}

impl MergeConflict {
    fn from_patch(side: Side, err: &PatchError) -> Self {
        Self {
            side,
            path: err.path().cloned().unwrap_or_else(Pointer::root),
            reason: err.to_string(),
        }
    }
}

impl std::fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conflict at {} ({} changes): {}", self.path, self.side, self.reason)
    }
}

/// Merge two states that diverged from `ancestor`.
///
/// When both sides write the same location, the target's write is applied
/// last; whether it applies cleanly decides between a merge and a conflict.
pub fn three_way(
    ancestor: &Document,
    target: &Document,
    source: &Document,
) -> std::result::Result<Document, MergeConflict> {
    if target == source {
        return Ok(target.clone());
    }
    let source_ops = patch::diff(ancestor, source);
    let target_ops: Vec<PatchOp> = patch::diff(ancestor, target)
        .into_iter()
        .filter(|op| !(source_ops.contains(op) && keyed_path(ancestor, op)))
        .collect();

    let merged = patch::apply(ancestor, &source_ops)
        .map_err(|e| MergeConflict::from_patch(Side::Source, &e))?;
    patch::apply_converging(&merged, &target_ops)
        .map_err(|e| MergeConflict::from_patch(Side::Target, &e))
}

/// Whether every container on the op's path in `ancestor` is an object.
///
/// Array positions shift under the other side's inserts and removals, so an
/// op that looks identical on both sides may address different elements.
fn keyed_path(ancestor: &Document, op: &PatchOp) -> bool {
    let mut node = Some(ancestor);
    for token in op.path().tokens() {
        match node {
            Some(Value::Array(_)) => return false,
            Some(Value::Object(map)) => node = map.get(&token),
            _ => node = None,
        }
    }
    true
}
