//! core::schema
//!
//! Persisted records: the repository singleton, branches, and commits.
//!
//! # Records
//!
//! - [`Repository`] - singleton holding the active-branch pointer
//! - [`Branch`] - named, mutable pointer to a head commit
//! - [`Commit`] - immutable snapshot or delta
//!
//! # Legacy Records
//!
//! Older stores wrote camelCase keys, millisecond timestamps, empty-string
//! heads, a single `parent` scalar instead of `parents`, and full
//! `documentState` values instead of compressed payloads. All of these are
//! normalized when a record is deserialized, so traversal code only ever sees
//! the current shape.
//!
//! # Example
//!
//! ```
//! use folio::core::schema::Commit;
//!
//! let legacy = r#"{
//!     "id": "c2",
//!     "branchId": "b1",
//!     "message": "second",
//!     "timestamp": 1700000000000,
//!     "parent": "c1",
//!     "isSnapshot": false,
//!     "payload": ""
//! }"#;
//!
//! let commit: Commit = serde_json::from_str(legacy).unwrap();
//! assert_eq!(commit.first_parent().map(|p| p.as_str()), Some("c1"));
//! assert_eq!(commit.author, "user");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use super::delta::{DeltaEngine, DeltaError};
use super::types::{BranchId, BranchName, CommitId, RepositoryId, TypeError, UtcTimestamp};

/// The author recorded on every commit unless configured otherwise.
pub const DEFAULT_AUTHOR: &str = "user";

/// Errors from normalizing a stored record.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid field: {0}")]
    InvalidField(#[from] TypeError),

    #[error("payload of commit {commit} is not valid hex: {message}")]
    InvalidPayload { commit: String, message: String },

    #[error("commit {0} has neither a payload nor a document state")]
    MissingPayload(String),

    #[error("commit {0} has more than two parents")]
    TooManyParents(String),

    #[error("failed to encode legacy document state: {0}")]
    LegacyState(#[source] DeltaError),
}

/// The repository singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    #[serde(alias = "createdAt", alias = "created")]
    pub created_at: UtcTimestamp,
    #[serde(alias = "activeBranch")]
    pub active_branch: BranchId,
}

/// A named pointer into the commit graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: BranchName,
    /// `None` until the first commit on this branch.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub head: Option<CommitId>,
    #[serde(alias = "createdAt", alias = "created")]
    pub created_at: UtcTimestamp,
}

impl Branch {
    /// Create a branch record with a fresh id.
    pub fn new(name: BranchName, head: Option<CommitId>) -> Self {
        Self {
            id: BranchId::generate(),
            name,
            head,
            created_at: UtcTimestamp::now(),
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<CommitId>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => CommitId::new(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// An immutable point in history.
///
/// A snapshot commit carries the whole state; any other commit carries the
/// delta from `parents[0]`. Merge commits have two parents and are always
/// deltas against their first parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommitRecord")]
pub struct Commit {
    pub id: CommitId,
    /// The branch the commit was authored on. Informational only.
    pub branch_id: BranchId,
    pub message: String,
    pub author: String,
    pub timestamp: UtcTimestamp,
    pub parents: Vec<CommitId>,
    pub is_snapshot: bool,
    #[serde(serialize_with = "hex_payload")]
    pub payload: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Commit {
    /// The parent the payload is relative to.
    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parents.first()
    }

    /// Whether this commit starts a history.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether this commit joins two histories.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The first line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

fn hex_payload<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(payload))
}

/// Every shape a commit has been stored in.
#[derive(Deserialize)]
struct CommitRecord {
    id: String,
    #[serde(alias = "branchId")]
    branch_id: String,
    message: String,
    #[serde(default)]
    author: Option<String>,
    timestamp: UtcTimestamp,
    #[serde(default)]
    parents: Vec<Option<String>>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default, alias = "isSnapshot")]
    is_snapshot: Option<bool>,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default, alias = "documentState")]
    document_state: Option<Value>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl TryFrom<CommitRecord> for Commit {
    type Error = SchemaError;

    fn try_from(record: CommitRecord) -> Result<Self, Self::Error> {
        let mut parent_ids: Vec<String> = record.parents.into_iter().flatten().collect();
        if parent_ids.is_empty() {
            parent_ids.extend(record.parent);
        }
        parent_ids.retain(|p| !p.is_empty());
        if parent_ids.len() > 2 {
            return Err(SchemaError::TooManyParents(record.id));
        }
        let parents = parent_ids
            .into_iter()
            .map(CommitId::new)
            .collect::<Result<Vec<_>, _>>()?;

        let (is_snapshot, payload) = match (record.payload, record.document_state) {
            (Some(hex_str), _) => {
                let bytes = hex::decode(&hex_str).map_err(|e| SchemaError::InvalidPayload {
                    commit: record.id.clone(),
                    message: e.to_string(),
                })?;
                (record.is_snapshot.unwrap_or(false), bytes)
            }
            (None, Some(state)) => {
                let bytes = DeltaEngine::default()
                    .encode_snapshot(&state)
                    .map_err(SchemaError::LegacyState)?;
                (true, bytes)
            }
            (None, None) => return Err(SchemaError::MissingPayload(record.id)),
        };

        Ok(Commit {
            id: CommitId::new(record.id)?,
            branch_id: BranchId::new(record.branch_id)?,
            message: record.message,
            author: record
                .author
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            timestamp: record.timestamp,
            parents,
            is_snapshot,
            payload,
            thumbnail: record.thumbnail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_commit() -> Commit {
        Commit {
            id: CommitId::new("c1").unwrap(),
            branch_id: BranchId::new("b1").unwrap(),
            message: "first".into(),
            author: DEFAULT_AUTHOR.into(),
            timestamp: UtcTimestamp::from_millis(1_700_000_000_000).unwrap(),
            parents: vec![],
            is_snapshot: true,
            payload: vec![0xde, 0xad],
            thumbnail: Some("data:image/png;base64,AAAA".into()),
        }
    }

    mod commit {
        use super::*;

        #[test]
        fn roundtrip_current_shape() {
            let commit = sample_commit();
            let json = serde_json::to_value(&commit).unwrap();
            assert_eq!(json["payload"], "dead");
            assert_eq!(json["parents"], json!([]));
            let back: Commit = serde_json::from_value(json).unwrap();
            assert_eq!(back, commit);
        }

        #[test]
        fn null_parent_list_is_root() {
            let commit: Commit = serde_json::from_value(json!({
                "id": "c1", "branchId": "b1", "message": "m",
                "timestamp": 0, "parents": [null], "isSnapshot": true, "payload": "00"
            }))
            .unwrap();
            assert!(commit.is_root());
        }

        #[test]
        fn parents_take_precedence_over_parent() {
            let commit: Commit = serde_json::from_value(json!({
                "id": "m", "branch_id": "b", "message": "merge",
                "timestamp": 0, "parents": ["a", "b"], "parent": "zzz", "payload": ""
            }))
            .unwrap();
            assert!(commit.is_merge());
            assert_eq!(commit.first_parent().unwrap().as_str(), "a");
        }

        #[test]
        fn document_state_becomes_snapshot() {
            let state = json!({"children": [{"id": "x"}]});
            let commit: Commit = serde_json::from_value(json!({
                "id": "c1", "branchId": "b1", "message": "legacy",
                "timestamp": 1, "documentState": state.clone()
            }))
            .unwrap();
            assert!(commit.is_snapshot);
            let decoded = DeltaEngine::default().decode_snapshot(&commit.payload).unwrap();
            assert_eq!(decoded, state);
        }

        #[test]
        fn missing_payload_rejected() {
            let err = serde_json::from_value::<Commit>(json!({
                "id": "c1", "branchId": "b1", "message": "m", "timestamp": 1
            }))
            .unwrap_err();
            assert!(err.to_string().contains("neither a payload"));
        }

        #[test]
        fn bad_hex_rejected() {
            assert!(serde_json::from_value::<Commit>(json!({
                "id": "c1", "branchId": "b1", "message": "m", "timestamp": 1,
                "payload": "zz"
            }))
            .is_err());
        }

        #[test]
        fn summary_is_first_line() {
            let mut commit = sample_commit();
            commit.message = "title\n\nbody".into();
            assert_eq!(commit.summary(), "title");
        }
    }

    mod branch {
        use super::*;

        #[test]
        fn empty_head_is_none() {
            let branch: Branch = serde_json::from_value(json!({
                "id": "b1", "name": "main", "head": "", "createdAt": 1700000000000i64
            }))
            .unwrap();
            assert_eq!(branch.head, None);
        }

        #[test]
        fn missing_head_is_none() {
            let branch: Branch = serde_json::from_value(json!({
                "id": "b1", "name": "main", "created_at": "2024-01-01T00:00:00Z"
            }))
            .unwrap();
            assert_eq!(branch.head, None);
        }
    }

    #[test]
    fn repository_accepts_legacy_keys() {
        let repo: Repository = serde_json::from_value(json!({
            "id": "folio-repository", "name": "Main Repository",
            "created": 1700000000000i64, "activeBranch": "b1"
        }))
        .unwrap();
        assert_eq!(repo.active_branch.as_str(), "b1");
    }
}
