//! Folio - local version control for tree-shaped documents
//!
//! Folio records immutable snapshots and deltas of a JSON document tree,
//! organizes them into a branchable commit graph, reconstructs any
//! historical state, and merges diverged branches with a three-way,
//! patch-based merge.
//!
//! # Architecture
//!
//! The codebase is layered:
//!
//! - [`cli`] - Command-line interface (parses args, delegates to engine)
//! - [`engine`] - Orchestrates commit, switch, and merge against a live document
//! - [`core`] - Domain types, delta codec, object/branch/repository stores,
//!   reconstruction, merge algorithm, configuration
//! - [`store`] - Transactional storage backends (in-memory and on-disk)
//! - [`ui`] - Terminal output and graph rendering
//!
//! # Correctness Invariants
//!
//! Folio maintains the following invariants:
//!
//! 1. Commits are immutable and never deleted
//! 2. Every commit reconstructs to exactly the state it recorded
//! 3. Pointer updates that belong together are applied as one batch
//! 4. A failed or conflicting operation leaves pointers and the document
//!    unchanged

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
pub mod ui;
