//! show and diff commands

use anyhow::Result;

use super::Session;
use crate::cli::Context;
use crate::ui::output;

/// Show one commit, optionally with the changes it introduced.
pub async fn show(ctx: &Context, commit: &str, patch: bool) -> Result<()> {
    let session = Session::open(ctx).await?;
    let commit = session.workspace.resolve_commit(commit).await?;
    let changes = if patch {
        Some(session.workspace.changes_in(&commit).await?)
    } else {
        None
    };
    session.close().await;

    let mut text = output::format_commit(&commit);
    if let Some(ops) = changes {
        text.push_str("\n\n");
        text.push_str(&output::format_patch(&ops));
    }
    output::print(text, ctx.verbosity());
    Ok(())
}

/// Show the patch from one commit to another, or to the document on disk.
pub async fn diff(ctx: &Context, from: &str, to: Option<&str>) -> Result<()> {
    let session = Session::open(ctx).await?;
    let ws = &session.workspace;
    let from = ws.resolve_commit(from).await?;
    let to = match to {
        Some(prefix) => Some(ws.resolve_commit(prefix).await?),
        None => None,
    };
    let comparison = ws.compare(&from.id, to.as_ref().map(|c| &c.id)).await?;
    session.close().await;

    if comparison.ops.is_empty() {
        output::print("No differences", ctx.verbosity());
    } else {
        output::print(output::format_patch(&comparison.ops), ctx.verbosity());
    }
    Ok(())
}
