//! branch and switch commands

use anyhow::Result;

use super::Session;
use crate::cli::args::BranchAction;
use crate::cli::Context;
use crate::ui::output;

/// List, create, or delete branches. Lists when no action is given.
pub async fn branch(ctx: &Context, action: Option<BranchAction>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let session = Session::open(ctx).await?;
    let ws = &session.workspace;

    let message = match action.unwrap_or(BranchAction::List) {
        BranchAction::List => {
            let branches = ws.branches().await?;
            let active = ws.active_branch().await?;
            output::format_branches(&branches, &active)
        }
        BranchAction::Create { name } => {
            let branch = ws.create_branch(&name).await?;
            match &branch.head {
                Some(head) => format!(
                    "Created branch '{}' at {}",
                    branch.name,
                    head.short(output::SHORT_ID)
                ),
                None => format!("Created branch '{}'", branch.name),
            }
        }
        BranchAction::Delete { name } => {
            let branch = ws.delete_branch(&name).await?;
            format!("Deleted branch '{}'", branch.name)
        }
    };
    session.close().await;

    output::print(message, verbosity);
    Ok(())
}

/// Load a branch into the document and make it active.
pub async fn switch(ctx: &Context, name: &str) -> Result<()> {
    let session = Session::open(ctx).await?;
    let branch = session.workspace.switch_branch(name).await?;
    session.close().await;

    output::print(format!("Switched to branch '{}'", branch.name), ctx.verbosity());
    Ok(())
}
