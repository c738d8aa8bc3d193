//! core::error
//!
//! The error taxonomy shared by every store and algorithm.
//!
//! # Categories
//!
//! - [`Error::Validation`] - bad input, rejected before any mutation
//! - [`Error::NotFound`] - lookup of a missing branch, commit or repository
//! - [`Error::Conflict`] - operation forbidden by an invariant
//! - [`Error::BrokenHistory`] - the commit graph itself is damaged
//! - [`Error::CorruptDelta`] - a stored payload cannot be decoded or applied
//!
//! No-op results (an unchanged commit, an up-to-date merge) and merge
//! conflicts are not errors; they are ordinary return values.

use thiserror::Error;

use super::delta::DeltaError;
use super::types::{CommitId, TypeError};
use crate::engine::document::HostError;
use crate::store::StoreError;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate a repository invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The commit graph references data that is missing or malformed.
    #[error("broken history: {0}")]
    BrokenHistory(String),

    /// A stored payload could not be decoded or applied.
    #[error("corrupt delta in commit {commit}: {source}")]
    CorruptDelta {
        /// The commit whose payload failed.
        commit: CommitId,
        /// The underlying decode or patch failure.
        #[source]
        source: DeltaError,
    },

    /// Encoding or decoding a state outside of any stored commit failed.
    #[error("codec error: {0}")]
    Codec(#[from] DeltaError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The document host failed to capture or restore a state.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Validation(err.to_string())
    }
}

/// Result alias for repository operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchName;

    #[test]
    fn type_errors_become_validation() {
        let err: Error = BranchName::new("").unwrap_err().into();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("branch name cannot be empty"));
    }

    #[test]
    fn corrupt_delta_names_the_commit() {
        let commit = CommitId::new("c0ffee").unwrap();
        let err = Error::CorruptDelta {
            commit,
            source: DeltaError::Decompress(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad frame",
            )),
        };
        assert!(err.to_string().contains("c0ffee"));
    }
}
