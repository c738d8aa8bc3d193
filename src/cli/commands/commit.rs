//! commit command - Record the document on the active branch

use anyhow::Result;

use super::Session;
use crate::cli::Context;
use crate::ui::output::{self, SHORT_ID};

/// Record the document. Prints a notice and succeeds when nothing changed.
pub async fn commit(ctx: &Context, message: &str, thumbnail: Option<String>) -> Result<()> {
    let session = Session::open(ctx).await?;
    let branch = session.workspace.active_branch().await?;
    let result = session
        .workspace
        .commit_with_thumbnail(message, thumbnail)
        .await;
    session.close().await;

    match result? {
        Some(commit) => {
            let branch = branch.name;
            let kind = if commit.is_snapshot { " (snapshot)" } else { "" };
            output::print(
                format!(
                    "[{branch} {}]{kind} {}",
                    commit.id.short(SHORT_ID),
                    commit.summary()
                ),
                ctx.verbosity(),
            );
        }
        None => output::print("Nothing to commit, document unchanged", ctx.verbosity()),
    }
    Ok(())
}
