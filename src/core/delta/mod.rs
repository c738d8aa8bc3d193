//! core::delta
//!
//! The delta engine: turns pairs of document states into compressed payloads
//! and back.
//!
//! # Payloads
//!
//! A commit payload is one of:
//!
//! - a **snapshot**: the whole state as compressed JSON
//! - a **delta**: the compressed JSON list of [`PatchOp`]s that transforms the
//!   parent state into this one
//! - the **empty payload** ([`EMPTY_PAYLOAD`]): a zero-length delta meaning
//!   "no change"
//!
//! # Example
//!
//! ```
//! use folio::core::delta::{is_empty_payload, DeltaEngine};
//! use serde_json::json;
//!
//! let engine = DeltaEngine::default();
//! let base = json!({"children": [{"id": "a", "x": 1}]});
//! let next = json!({"children": [{"id": "a", "x": 2}]});
//!
//! let payload = engine.compute_delta(&base, &next).unwrap();
//! assert_eq!(engine.apply_delta(&base, &payload).unwrap(), next);
//!
//! assert!(is_empty_payload(&engine.compute_delta(&next, &next).unwrap()));
//! ```

pub mod compress;
pub mod patch;
pub mod pointer;

use std::io;

use serde_json::Value;
use thiserror::Error;

pub use patch::{PatchError, PatchOp};
pub use pointer::Pointer;

/// A document state: an arbitrary JSON tree.
pub type Document = Value;

/// The "no change" delta.
pub const EMPTY_PAYLOAD: &[u8] = &[];

/// Whether `payload` is the "no change" sentinel.
pub fn is_empty_payload(payload: &[u8]) -> bool {
    payload.is_empty()
}

/// The state of a document that has never been committed.
pub fn empty_document() -> Document {
    serde_json::json!({ "children": [] })
}

/// Errors from encoding or decoding payloads.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// Compression failed.
    #[error("failed to compress payload: {0}")]
    Compress(#[source] io::Error),

    /// The payload is not a valid compressed frame.
    #[error("failed to decompress payload: {0}")]
    Decompress(#[source] io::Error),

    /// A state or patch could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The decompressed bytes are not the expected JSON.
    #[error("failed to parse payload: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// The patch does not apply to the base state.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A snapshot payload was empty.
    #[error("snapshot payload is empty")]
    EmptySnapshot,
}

/// Encodes and decodes commit payloads at a fixed compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEngine {
    level: i32,
}

impl Default for DeltaEngine {
    fn default() -> Self {
        Self {
            level: compress::DEFAULT_LEVEL,
        }
    }
}

impl DeltaEngine {
    /// Create an engine compressing at `level`.
    ///
    /// Levels outside the zstd range are clamped into it.
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(*compress::LEVELS.start(), *compress::LEVELS.end()),
        }
    }

    /// The compression level in use.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Diff `base` against `next` and encode the result.
    ///
    /// Returns [`EMPTY_PAYLOAD`] when the states are equal.
    pub fn compute_delta(&self, base: &Document, next: &Document) -> Result<Vec<u8>, DeltaError> {
        let ops = patch::diff(base, next);
        self.encode_ops(&ops)
    }

    /// Encode an operation list; an empty list encodes as [`EMPTY_PAYLOAD`].
    pub fn encode_ops(&self, ops: &[PatchOp]) -> Result<Vec<u8>, DeltaError> {
        if ops.is_empty() {
            return Ok(EMPTY_PAYLOAD.to_vec());
        }
        let json = serde_json::to_vec(ops).map_err(DeltaError::Serialize)?;
        compress::compress(&json, self.level).map_err(DeltaError::Compress)
    }

    /// Decode the operation list of a delta payload.
    pub fn decode_ops(&self, payload: &[u8]) -> Result<Vec<PatchOp>, DeltaError> {
        if is_empty_payload(payload) {
            return Ok(Vec::new());
        }
        let json = compress::decompress(payload).map_err(DeltaError::Decompress)?;
        serde_json::from_slice(&json).map_err(DeltaError::Deserialize)
    }

    /// Apply a delta payload to `base`.
    ///
    /// The empty payload is the identity. Any operation that does not fit
    /// fails the whole application.
    pub fn apply_delta(&self, base: &Document, payload: &[u8]) -> Result<Document, DeltaError> {
        if is_empty_payload(payload) {
            return Ok(base.clone());
        }
        let ops = self.decode_ops(payload)?;
        Ok(patch::apply(base, &ops)?)
    }

    /// Encode a full state.
    pub fn encode_snapshot(&self, state: &Document) -> Result<Vec<u8>, DeltaError> {
        let json = serde_json::to_vec(state).map_err(DeltaError::Serialize)?;
        compress::compress(&json, self.level).map_err(DeltaError::Compress)
    }

    /// Decode a full state.
    pub fn decode_snapshot(&self, payload: &[u8]) -> Result<Document, DeltaError> {
        if payload.is_empty() {
            return Err(DeltaError::EmptySnapshot);
        }
        let json = compress::decompress(payload).map_err(DeltaError::Decompress)?;
        serde_json::from_slice(&json).map_err(DeltaError::Deserialize)
    }
}
