//! core::delta::patch
//!
//! Structural diff and strict patch application over document states.
//!
//! # Operations
//!
//! A patch is an ordered list of [`PatchOp`]s addressed by JSON pointers:
//!
//! - `add` inserts an object member or an array element
//! - `remove` deletes an object member or an array element
//! - `replace` swaps a value, recording the value it expects to replace
//!
//! # Diff Shape
//!
//! Objects are compared member by member in key order: removed members
//! first, then changes inside members present on both sides, then new
//! members. Arrays are compared position by position; surplus elements of
//! the new array are added in ascending index order and surplus elements of
//! the old array are removed in descending index order. Child ordering is
//! therefore preserved exactly.
//!
//! # Strictness
//!
//! [`apply`] works on a copy of its input and stops at the first operation
//! that does not fit: a missing path, an `add` onto an occupied member with a
//! different value, or a `replace` whose current value differs from the
//! recorded one. The caller's document is never partially patched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::pointer::Pointer;

/// Errors from applying a patch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// A pointer was malformed.
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    /// The operation addresses a location that does not exist.
    #[error("path not found: {0}")]
    PathNotFound(Pointer),

    /// An `add` targets a member that already holds a different value.
    #[error("path already holds a different value: {0}")]
    PathOccupied(Pointer),

    /// A `replace` found a value other than the one it was computed against.
    #[error("value at {0} differs from the value the patch was computed against")]
    PreconditionFailed(Pointer),

    /// An array was addressed with something other than an index.
    #[error("invalid array index {token:?} at {path}")]
    InvalidIndex {
        /// The full pointer of the operation.
        path: Pointer,
        /// The offending token.
        token: String,
    },
}

impl PatchError {
    /// The location of the failing operation, if the error names one.
    pub fn path(&self) -> Option<&Pointer> {
        match self {
            PatchError::InvalidPointer(_) => None,
            PatchError::PathNotFound(path)
            | PatchError::PathOccupied(path)
            | PatchError::PreconditionFailed(path)
            | PatchError::InvalidIndex { path, .. } => Some(path),
        }
    }
}

/// A single structural edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a member or element.
    Add {
        /// Where to insert.
        path: Pointer,
        /// The inserted value.
        value: Value,
    },
    /// Delete a member or element.
    Remove {
        /// What to delete.
        path: Pointer,
    },
    /// Replace a value.
    Replace {
        /// What to replace.
        path: Pointer,
        /// The value expected at `path` before the edit.
        old: Value,
        /// The new value.
        value: Value,
    },
}

impl PatchOp {
    /// The location this operation addresses.
    pub fn path(&self) -> &Pointer {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => {
                path
            }
        }
    }
}

impl std::fmt::Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchOp::Add { path, value } => write!(f, "+ {path} = {value}"),
            PatchOp::Remove { path } => write!(f, "- {path}"),
            PatchOp::Replace { path, old, value } => write!(f, "~ {path}: {old} -> {value}"),
        }
    }
}

/// Compute the operations that transform `base` into `next`.
///
/// Returns an empty list exactly when the two states are equal.
///
/// # Example
///
/// ```
/// use folio::core::delta::patch::{apply, diff};
/// use serde_json::json;
///
/// let base = json!({"children": [{"id": "r1", "width": 10}]});
/// let next = json!({"children": [{"id": "r1", "width": 20}, {"id": "e1"}]});
///
/// let ops = diff(&base, &next);
/// assert_eq!(ops.len(), 2);
/// assert_eq!(apply(&base, &ops).unwrap(), next);
/// assert!(diff(&next, &next).is_empty());
/// ```
pub fn diff(base: &Value, next: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_value(&Pointer::root(), base, next, &mut ops);
    ops
}

fn diff_value(path: &Pointer, base: &Value, next: &Value, ops: &mut Vec<PatchOp>) {
    if base == next {
        return;
    }

    match (base, next) {
        (Value::Object(old), Value::Object(new)) => {
            for key in old.keys() {
                if !new.contains_key(key) {
                    ops.push(PatchOp::Remove {
                        path: path.child(key),
                    });
                }
            }
            for (key, old_value) in old {
                if let Some(new_value) = new.get(key) {
                    diff_value(&path.child(key), old_value, new_value, ops);
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: path.child(key),
                        value: new_value.clone(),
                    });
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            let common = old.len().min(new.len());
            for i in 0..common {
                diff_value(&path.index(i), &old[i], &new[i], ops);
            }
            for (i, value) in new.iter().enumerate().skip(common) {
                ops.push(PatchOp::Add {
                    path: path.index(i),
                    value: value.clone(),
                });
            }
            for i in (common..old.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: path.index(i),
                });
            }
        }
        _ => ops.push(PatchOp::Replace {
            path: path.clone(),
            old: base.clone(),
            value: next.clone(),
        }),
    }
}

/// Apply `ops` to a copy of `base`.
///
/// # Errors
///
/// Returns the first [`PatchError`] encountered; `base` is left untouched.
///
/// # Example
///
/// ```
/// use folio::core::delta::patch::{apply, PatchError, PatchOp};
/// use folio::core::delta::pointer::Pointer;
/// use serde_json::json;
///
/// let ops = vec![PatchOp::Remove { path: Pointer::root().child("gone") }];
/// let err = apply(&json!({"kept": 1}), &ops).unwrap_err();
/// assert!(matches!(err, PatchError::PathNotFound(_)));
/// ```
pub fn apply(base: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    apply_with(base, ops, false)
}

/// Like [`apply`], except a `Replace` whose target already holds the new
/// value succeeds without checking `old`.
///
/// Used when replaying one side of a merge over the other, where both may
/// have written the same value.
pub fn apply_converging(base: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    apply_with(base, ops, true)
}

fn apply_with(base: &Value, ops: &[PatchOp], converging: bool) -> Result<Value, PatchError> {
    let mut doc = base.clone();
    for op in ops {
        apply_op(&mut doc, op, converging)?;
    }
    Ok(doc)
}

fn apply_op(doc: &mut Value, op: &PatchOp, converging: bool) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value),
        PatchOp::Remove { path } => remove(doc, path),
        PatchOp::Replace { path, old, value } => {
            let target = path
                .resolve_mut(doc)
                .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;
            if converging && target == value {
                return Ok(());
            }
            if target != old {
                return Err(PatchError::PreconditionFailed(path.clone()));
            }
            *target = value.clone();
            Ok(())
        }
    }
}

fn add(doc: &mut Value, path: &Pointer, value: &Value) -> Result<(), PatchError> {
    let Some((parent, token)) = path.split_last() else {
        // The root always exists, so it is only a valid target when unchanged.
        return if doc == value {
            Ok(())
        } else {
            Err(PatchError::PathOccupied(path.clone()))
        };
    };

    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;

    match container {
        Value::Object(map) => {
            if let Some(existing) = map.get(&token) {
                return if existing == value {
                    Ok(())
                } else {
                    Err(PatchError::PathOccupied(path.clone()))
                };
            }
            map.insert(token, value.clone());
            Ok(())
        }
        Value::Array(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                parse_index(path, &token)?
            };
            if index > items.len() {
                return Err(PatchError::PathNotFound(path.clone()));
            }
            items.insert(index, value.clone());
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.clone())),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> Result<(), PatchError> {
    let (parent, token) = path
        .split_last()
        .ok_or_else(|| PatchError::InvalidPointer("cannot remove the document root".into()))?;

    let container = parent
        .resolve_mut(doc)
        .ok_or_else(|| PatchError::PathNotFound(path.clone()))?;

    match container {
        Value::Object(map) => map
            .remove(&token)
            .map(|_| ())
            .ok_or_else(|| PatchError::PathNotFound(path.clone())),
        Value::Array(items) => {
            let index = parse_index(path, &token)?;
            if index >= items.len() {
                return Err(PatchError::PathNotFound(path.clone()));
            }
            items.remove(index);
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.clone())),
    }
}

/// Parse an array index token: decimal digits without leading zeros.
fn parse_index(path: &Pointer, token: &str) -> Result<usize, PatchError> {
    let canonical = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !canonical {
        return Err(PatchError::InvalidIndex {
            path: path.clone(),
            token: token.to_string(),
        });
    }
    token.parse().map_err(|_| PatchError::InvalidIndex {
        path: path.clone(),
        token: token.to_string(),
    })
}
