//! status command - Show where the workspace stands

use anyhow::Result;

use super::Session;
use crate::cli::Context;
use crate::ui::output::{self, SHORT_ID};

/// Show the active branch, its head, and whether the document changed.
pub async fn status(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx).await?;
    let status = session.workspace.status().await?;
    session.close().await;

    let mut lines = vec![
        format!("On branch {}", status.active.name),
        format!("Repository: {}", status.repository.name),
    ];
    match &status.head {
        Some(head) => lines.push(format!(
            "Head: {} {}",
            head.id.short(SHORT_ID),
            head.summary()
        )),
        None => lines.push("No commits yet".to_string()),
    }
    lines.push(if status.dirty {
        "Document has uncommitted changes".to_string()
    } else {
        "Document is clean".to_string()
    });
    lines.push(format!(
        "{} commit(s), {} branch(es), state {}",
        status.commit_count,
        status.branch_count,
        status.digest.short(12)
    ));

    output::print(lines.join("\n"), ctx.verbosity());
    Ok(())
}
