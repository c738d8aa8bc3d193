//! ui
//!
//! Terminal output for the command line.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing and commit formatting
//! - [`graph`] - Text and Mermaid renderings of the commit graph
//!
//! Rendering functions are pure: they take query results and return
//! strings. Only [`output`] writes to the terminal.

pub mod graph;
pub mod output;
