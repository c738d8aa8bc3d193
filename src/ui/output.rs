//! ui::output
//!
//! Output formatting and display.
//!
//! Results go to stdout and are suppressed by `--quiet`. Errors and
//! warnings go to stderr.

use std::fmt::Display;

use crate::core::delta::PatchOp;
use crate::core::schema::{Branch, Commit};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `quiet` wins over `debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Width of abbreviated commit ids.
pub const SHORT_ID: usize = 8;

/// One line per commit: `<short id> <summary>`.
pub fn format_oneline(commit: &Commit) -> String {
    format!("{} {}", commit.id.short(SHORT_ID), commit.summary())
}

/// A commit header with its full message.
///
/// ```
/// use folio::core::schema::Commit;
/// use folio::ui::output::format_commit;
///
/// let commit: Commit = serde_json::from_value(serde_json::json!({
///     "id": "c1",
///     "branch_id": "b1",
///     "message": "first\n\nwith body",
///     "author": "ada",
///     "timestamp": 0,
///     "parents": [],
///     "is_snapshot": true,
///     "payload": "00"
/// }))
/// .unwrap();
///
/// let text = format_commit(&commit);
/// assert!(text.starts_with("commit c1 (snapshot)\n"));
/// assert!(text.contains("Author: ada"));
/// assert!(text.ends_with("    first\n    \n    with body"));
/// ```
pub fn format_commit(commit: &Commit) -> String {
    let kind = if commit.is_snapshot { " (snapshot)" } else { "" };
    let mut out = format!("commit {}{}\n", commit.id, kind);
    if commit.is_merge() {
        let parents: Vec<String> = commit
            .parents
            .iter()
            .map(|p| p.short(SHORT_ID).to_string())
            .collect();
        out.push_str(&format!("Merge:  {}\n", parents.join(" ")));
    }
    out.push_str(&format!("Author: {}\n", commit.author));
    out.push_str(&format!("Date:   {}\n\n", commit.timestamp));
    let body: Vec<String> = commit.message.lines().map(|l| format!("    {l}")).collect();
    out.push_str(&body.join("\n"));
    out
}

/// Branch list with the active branch starred.
pub fn format_branches(branches: &[Branch], active: &Branch) -> String {
    branches
        .iter()
        .map(|b| {
            let marker = if b.id == active.id { "*" } else { " " };
            let head = b
                .head
                .as_ref()
                .map(|h| h.short(SHORT_ID).to_string())
                .unwrap_or_else(|| "(no commits)".to_string());
            format!("{marker} {:<20} {head}", b.name.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A patch, one operation per line, `+`/`-`/`~` prefixed.
pub fn format_patch(ops: &[PatchOp]) -> String {
    ops.iter()
        .map(|op| match op {
            PatchOp::Add { path, value } => format!("+ {path} {value}"),
            PatchOp::Remove { path } => format!("- {path}"),
            PatchOp::Replace { path, old, value } => format!("~ {path} {old} -> {value}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::delta::Pointer;
    use crate::core::types::{BranchName, CommitId};
    use serde_json::json;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn patch_lines() {
        let ops = vec![
            PatchOp::Add {
                path: Pointer::parse("/children/0").unwrap(),
                value: json!({"id": "a"}),
            },
            PatchOp::Replace {
                path: Pointer::parse("/title").unwrap(),
                old: json!("x"),
                value: json!("y"),
            },
            PatchOp::Remove {
                path: Pointer::parse("/old").unwrap(),
            },
        ];
        assert_eq!(
            format_patch(&ops),
            "+ /children/0 {\"id\":\"a\"}\n~ /title \"x\" -> \"y\"\n- /old"
        );
    }

    #[test]
    fn merge_header_abbreviates_parents() {
        let commit: Commit = serde_json::from_value(json!({
            "id": "0123456789abcdef",
            "branch_id": "b1",
            "message": "Merge branch 'logo' into 'main'",
            "author": "user",
            "timestamp": 0,
            "parents": ["aaaaaaaa11111111", "bbbbbbbb22222222"],
            "is_snapshot": false,
            "payload": "00"
        }))
        .unwrap();
        let text = format_commit(&commit);
        assert!(text.contains("Merge:  aaaaaaaa bbbbbbbb\n"));
    }

    #[test]
    fn branch_list_marks_active_and_empty() {
        let main = Branch::new(
            BranchName::main(),
            Some(CommitId::new("0123456789abcdef").unwrap()),
        );
        let draft = Branch::new(BranchName::new("draft").unwrap(), None);
        let listing = format_branches(&[main.clone(), draft], &main);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], format!("* {:<20} 01234567", "main"));
        assert_eq!(lines[1], format!("  {:<20} (no commits)", "draft"));
    }
}
