//! core::delta::pointer
//!
//! RFC 6901 JSON pointers addressing a location inside a document.
//!
//! The pointer is stored in its encoded form (`~` as `~0`, `/` as `~1`),
//! so it can be handed directly to `serde_json::Value::pointer`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::patch::PatchError;

/// A location inside a document state.
///
/// # Example
///
/// ```
/// use folio::core::delta::pointer::Pointer;
/// use serde_json::json;
///
/// let path = Pointer::root().child("children").index(0).child("a/b");
/// assert_eq!(path.as_str(), "/children/0/a~1b");
///
/// let doc = json!({"children": [{"a/b": 7}]});
/// assert_eq!(path.resolve(&doc), Some(&json!(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pointer(String);

impl Pointer {
    /// The pointer to the whole document.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse an encoded pointer.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::InvalidPointer` unless the pointer is empty or
    /// starts with `/`, or if it contains a dangling `~` escape.
    pub fn parse(encoded: impl Into<String>) -> Result<Self, PatchError> {
        let encoded = encoded.into();
        if !encoded.is_empty() && !encoded.starts_with('/') {
            return Err(PatchError::InvalidPointer(format!(
                "pointer must be empty or start with '/': {encoded:?}"
            )));
        }
        let mut chars = encoded.chars();
        while let Some(c) = chars.next() {
            if c == '~' && !matches!(chars.next(), Some('0') | Some('1')) {
                return Err(PatchError::InvalidPointer(format!(
                    "invalid '~' escape in {encoded:?}"
                )));
            }
        }
        Ok(Self(encoded))
    }

    /// Whether this pointer addresses the whole document.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Extend the pointer with an object key.
    pub fn child(&self, key: &str) -> Self {
        let escaped = key.replace('~', "~0").replace('/', "~1");
        Self(format!("{}/{}", self.0, escaped))
    }

    /// Extend the pointer with an array index.
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}/{}", self.0, index))
    }

    /// Split into the parent pointer and the decoded final token.
    ///
    /// Returns `None` for the root pointer.
    pub fn split_last(&self) -> Option<(Pointer, String)> {
        let idx = self.0.rfind('/')?;
        let parent = Self(self.0[..idx].to_string());
        Some((parent, unescape(&self.0[idx + 1..])))
    }

    /// Decoded reference tokens, outermost first.
    pub fn tokens(&self) -> Vec<String> {
        self.0.split('/').skip(1).map(unescape).collect()
    }

    /// Look up the value this pointer addresses.
    pub fn resolve<'v>(&self, doc: &'v Value) -> Option<&'v Value> {
        doc.pointer(&self.0)
    }

    /// Look up the value this pointer addresses, mutably.
    pub fn resolve_mut<'v>(&self, doc: &'v mut Value) -> Option<&'v mut Value> {
        doc.pointer_mut(&self.0)
    }

    /// Get the encoded pointer.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

impl TryFrom<String> for Pointer {
    type Error = PatchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Pointer> for String {
    fn from(pointer: Pointer) -> Self {
        pointer.0
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
