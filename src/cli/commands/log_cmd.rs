//! log and graph commands

use anyhow::Result;

use super::Session;
use crate::cli::Context;
use crate::ui::{graph as render, output};

/// Show the first-parent history of a branch, newest first.
pub async fn log(ctx: &Context, branch: Option<&str>, oneline: bool) -> Result<()> {
    let session = Session::open(ctx).await?;
    let history = session.workspace.history(branch).await?;
    session.close().await;

    if history.is_empty() {
        output::print("No commits yet", ctx.verbosity());
        return Ok(());
    }
    let entries: Vec<String> = history
        .iter()
        .map(|c| {
            if oneline {
                output::format_oneline(c)
            } else {
                output::format_commit(c)
            }
        })
        .collect();
    let separator = if oneline { "\n" } else { "\n\n" };
    output::print(entries.join(separator), ctx.verbosity());
    Ok(())
}

/// Show every commit and branch.
pub async fn graph(ctx: &Context, mermaid: bool) -> Result<()> {
    let session = Session::open(ctx).await?;
    let view = session.workspace.graph().await?;
    session.close().await;

    let rendered = if mermaid {
        render::mermaid(&view)
    } else {
        render::text(&view)
    };
    output::print(rendered.trim_end(), ctx.verbosity());
    Ok(())
}
