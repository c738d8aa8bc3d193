//! init command - Create a repository in this directory

use anyhow::{Context as _, Result};

use super::Session;
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::paths::FolioPaths;
use crate::ui::output;

/// Create a repository in the context directory.
///
/// An existing repository is reported and left untouched, except that an
/// explicit `--name` or `--document` is recorded in its config.
pub async fn init(ctx: &Context, name: Option<&str>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let paths = FolioPaths::new(ctx.cwd()?);
    let existed = paths.exists();

    if name.is_some() || ctx.document.is_some() {
        let mut config = Config::load(Some(&paths))
            .context("Failed to load config")?
            .repo
            .unwrap_or_default();
        if let Some(name) = name {
            config.set("name", name)?;
        }
        if let Some(document) = &ctx.document {
            config.set("document", &document.to_string_lossy())?;
        }
        std::fs::create_dir_all(paths.data_dir()).context("Failed to create data directory")?;
        Config::write_repo(&paths, &config).context("Failed to write config")?;
    }

    let session = Session::open_at(ctx, paths).await?;
    let repo = session.workspace.initialize().await?;
    let root = session.paths.root.display().to_string();
    session.close().await;

    if existed {
        output::print(
            format!("Reinitialized existing repository '{}' in {root}", repo.name),
            verbosity,
        );
    } else {
        output::print(
            format!("Initialized empty repository '{}' in {root}", repo.name),
            verbosity,
        );
    }
    Ok(())
}

