//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`CommitId`] - Opaque, content-independent commit identifier
//! - [`BranchId`] - Opaque branch identifier
//! - [`RepositoryId`] - Identifier of the singleton repository record
//! - [`BranchName`] - Validated, human-facing branch name
//! - [`UtcTimestamp`] - Record timestamp
//! - [`StateDigest`] - SHA-256 over the canonical JSON of a document state
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use folio::core::types::{BranchName, CommitId};
//!
//! let branch = BranchName::new("feature/colors").unwrap();
//! let id = CommitId::generate();
//! assert_eq!(id.short(8).len(), 8);
//!
//! assert!(BranchName::new("").is_err());
//! assert!(BranchName::new("   ").is_err());
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Name of the branch every repository starts with.
pub const MAIN_BRANCH: &str = "main";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an existing identifier.
            ///
            /// # Errors
            ///
            /// Returns `TypeError::InvalidId` if the identifier is empty or
            /// contains whitespace or path separators.
            pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(TypeError::InvalidId("identifier cannot be empty".into()));
                }
                if id
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '\\')
                {
                    return Err(TypeError::InvalidId(format!(
                        "identifier contains invalid characters: {id:?}"
                    )));
                }
                Ok(Self(id))
            }

            /// Get an abbreviated form of the identifier.
            ///
            /// Returns the first `len` characters, or the full identifier if
            /// it is shorter.
            pub fn short(&self, len: usize) -> &str {
                let end = self
                    .0
                    .char_indices()
                    .nth(len)
                    .map(|(i, _)| i)
                    .unwrap_or(self.0.len());
                &self.0[..end]
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier of an immutable commit object.
    ///
    /// Commit ids are random, not derived from content: two commits with
    /// identical payloads still have distinct ids.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::types::CommitId;
    ///
    /// let a = CommitId::generate();
    /// let b = CommitId::generate();
    /// assert_ne!(a, b);
    ///
    /// let parsed = CommitId::new("3f2a9c1e").unwrap();
    /// assert_eq!(parsed.short(4), "3f2a");
    /// assert!(CommitId::new("").is_err());
    /// ```
    CommitId
);

opaque_id!(
    /// Identifier of a branch record.
    BranchId
);

opaque_id!(
    /// Identifier of the repository record.
    RepositoryId
);

impl RepositoryId {
    /// The fixed id of the one repository record in a store.
    pub const DEFAULT: &'static str = "folio-repository";

    /// The repository id every store uses.
    pub fn singleton() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

/// A validated branch name.
///
/// Names are compared case-sensitively and exactly. A name must contain at
/// least one non-whitespace character and no control characters.
///
/// # Example
///
/// ```
/// use folio::core::types::BranchName;
///
/// let name = BranchName::new("experiment").unwrap();
/// assert_eq!(name.as_str(), "experiment");
/// assert!(!name.is_main());
/// assert!(BranchName::main().is_main());
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("tab\there").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name is blank or
    /// contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// The protected `main` branch name.
    pub fn main() -> Self {
        Self(MAIN_BRANCH.to_string())
    }

    /// Whether this is the protected `main` branch.
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_BRANCH
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.trim().is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain control characters".into(),
            ));
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp.
///
/// Serialized as RFC3339. Deserialization also accepts integer
/// milliseconds since the Unix epoch, the shape older records used.
///
/// # Example
///
/// ```
/// use folio::core::types::UtcTimestamp;
///
/// let ts: UtcTimestamp = serde_json::from_str("1700000000000").unwrap();
/// assert_eq!(ts.to_string(), "2023-11-14T22:13:20+00:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Create a timestamp from milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Millis(i64),
            Rfc3339(chrono::DateTime<chrono::Utc>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Rfc3339(dt) => Ok(Self(dt)),
            Repr::Millis(ms) => Self::from_millis(ms).ok_or_else(|| {
                serde::de::Error::custom(format!("timestamp out of range: {ms}"))
            }),
        }
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable hash over a document state.
///
/// `serde_json` serializes object keys in sorted order, so equal states
/// always produce equal digests regardless of how they were built.
///
/// # Example
///
/// ```
/// use folio::core::types::StateDigest;
/// use serde_json::json;
///
/// let a = StateDigest::compute(&json!({"b": 1, "a": [1, 2]}));
/// let b = StateDigest::compute(&json!({"a": [1, 2], "b": 1}));
/// assert_eq!(a, b);
/// assert_ne!(a, StateDigest::compute(&json!({"a": [2, 1], "b": 1})));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDigest(String);

impl StateDigest {
    /// Compute the digest of a document state.
    pub fn compute(state: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(state.to_string().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the digest as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form of the digest.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl std::fmt::Display for StateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
