//! merge command - Merge a branch into the active branch

use anyhow::{bail, Result};

use super::Session;
use crate::cli::Context;
use crate::engine::MergeOutcome;
use crate::ui::output::{self, SHORT_ID};

/// Merge `source` into the active branch.
///
/// A conflict leaves everything unchanged and exits with an error that
/// names the conflicting path.
pub async fn merge(ctx: &Context, source: &str, message: Option<&str>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let session = Session::open(ctx).await?;
    let outcome = session.workspace.merge(source, message).await;
    session.close().await;

    match outcome? {
        MergeOutcome::UpToDate => output::print("Already up to date", verbosity),
        MergeOutcome::FastForward { head, .. } => output::print(
            format!("Fast-forwarded to {}", head.short(SHORT_ID)),
            verbosity,
        ),
        MergeOutcome::Merged { commit, .. } => output::print(
            format!(
                "Merged '{source}' as {} {}",
                commit.id.short(SHORT_ID),
                commit.summary()
            ),
            verbosity,
        ),
        MergeOutcome::Conflict(conflict) => {
            bail!("Merge of '{source}' abandoned, nothing was changed: {conflict}")
        }
    }
    Ok(())
}
