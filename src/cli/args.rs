//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--cwd <path>`: Run as if in that directory
//! - `--document <file>`: Track this document instead of the configured one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Folio - version control for tree-shaped documents
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if folio was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Document to track, relative to the repository root
    #[arg(long, global = true)]
    pub document: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a repository in the current directory
    #[command(
        long_about = "Create a repository in the current directory.\n\n\
            Creates the .folio/ data directory, the repository record and the \
            'main' branch. Running init again is harmless: an existing \
            repository is left as it is.",
        after_help = "\
EXAMPLES:
    folio init
    folio init --name \"Spring poster\" --document poster.json"
    )]
    Init {
        /// Repository display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Show the active branch and whether the document has changed
    Status,

    /// Record the document on the active branch
    #[command(after_help = "\
EXAMPLES:
    folio commit -m \"Add hero banner\"

    # Nothing is recorded when the document matches the last commit
    folio commit -m \"again\"")]
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Preview image to store with the commit (opaque text, e.g. a data URL)
        #[arg(long)]
        thumbnail: Option<String>,
    },

    /// List, create, or delete branches
    Branch {
        #[command(subcommand)]
        action: Option<BranchAction>,
    },

    /// Load a branch into the document and make it active
    #[command(long_about = "Load a branch into the document and make it active.\n\n\
        The document is overwritten with the branch's latest state. \
        Uncommitted changes are discarded.")]
    Switch {
        /// Branch name
        name: String,
    },

    /// Merge a branch into the active branch
    #[command(
        long_about = "Merge a branch into the active branch.\n\n\
            If the active branch has not moved since the other branch forked, \
            the active branch simply moves forward. Otherwise both sides' \
            changes are combined into a merge commit. If both sides changed the \
            same value, nothing is changed and the conflicting path is reported.",
        after_help = "\
EXAMPLES:
    folio switch main
    folio merge logo
    folio merge logo -m \"Bring in the new logo\""
    )]
    Merge {
        /// Branch to merge from
        name: String,

        /// Message for the merge commit
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show commit history of a branch
    Log {
        /// Branch to show (defaults to the active branch)
        #[arg(long)]
        branch: Option<String>,

        /// One line per commit
        #[arg(long)]
        oneline: bool,
    },

    /// Show the whole commit graph
    Graph {
        /// Print Mermaid flowchart source instead of text
        #[arg(long)]
        mermaid: bool,
    },

    /// Show a commit
    Show {
        /// Commit id or unique prefix
        commit: String,

        /// Also show the changes the commit introduced
        #[arg(long)]
        patch: bool,
    },

    /// Show the changes between two commits, or a commit and the document
    Diff {
        /// Commit id or unique prefix
        from: String,

        /// Commit id or unique prefix (defaults to the document on disk)
        to: Option<String>,
    },

    /// Get, set, or list configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Branch subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum BranchAction {
    /// List branches
    List,
    /// Create a branch at the active branch's latest commit
    Create {
        /// Branch name
        name: String,
    },
    /// Delete a branch
    Delete {
        /// Branch name
        name: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
    /// List all configuration values
    List,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
