//! core
//!
//! Core domain types, records and algorithms.
//!
//! # Modules
//!
//! - [`types`] - Strong types: CommitId, BranchName, UtcTimestamp, etc.
//! - [`error`] - The error taxonomy shared by every operation
//! - [`schema`] - Repository, branch and commit records
//! - [`delta`] - Structural diff/patch, compression, and the delta engine
//! - [`objects`] - Append-only commit store
//! - [`branches`] - Branch pointers and their protection rules
//! - [`repository`] - Repository lifecycle and the active-branch pointer
//! - [`reconstruct`] - Rebuilding the state at any commit
//! - [`merge`] - Common ancestors, fast-forwards and three-way merges
//! - [`history`] - Linear history and whole-graph projections
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for repository storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Commits are immutable; only branch heads and the active branch move
//! - No-op outcomes are values, not errors

pub mod branches;
pub mod config;
pub mod delta;
pub mod error;
pub mod history;
pub mod merge;
pub mod objects;
pub mod paths;
pub mod reconstruct;
pub mod repository;
pub mod schema;
pub mod types;
