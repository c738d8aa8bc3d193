//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository as a [`Session`]
//! 2. Calls the workspace to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT touch the store directly.
//!
//! # Async Commands
//!
//! The store and the document are async boundaries, so repository commands
//! run on a tokio runtime created here. `config` and `completion` stay
//! synchronous.

mod branch;
mod commit;
mod completion;
mod config_cmd;
mod init;
mod log_cmd;
mod merge;
mod show;
mod status;

pub use branch::{branch, switch};
pub use commit::commit;
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use init::init;
pub use log_cmd::{graph, log};
pub use merge::merge;
pub use show::{diff, show};
pub use status::status;

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::paths::FolioPaths;
use crate::engine::document::JsonFileDocument;
use crate::engine::{Settings, Workspace};
use crate::store::file::FileBackend;
use crate::store::Backend;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
        command => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_async(command, ctx))
        }
    }
}

async fn run_async(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init { name } => init::init(ctx, name.as_deref()).await,
        Command::Status => status::status(ctx).await,
        Command::Commit { message, thumbnail } => commit::commit(ctx, &message, thumbnail).await,
        Command::Branch { action } => branch::branch(ctx, action).await,
        Command::Switch { name } => branch::switch(ctx, &name).await,
        Command::Merge { name, message } => merge::merge(ctx, &name, message.as_deref()).await,
        Command::Log { branch, oneline } => log_cmd::log(ctx, branch.as_deref(), oneline).await,
        Command::Graph { mermaid } => log_cmd::graph(ctx, mermaid).await,
        Command::Show { commit, patch } => show::show(ctx, &commit, patch).await,
        Command::Diff { from, to } => show::diff(ctx, &from, to.as_deref()).await,
        Command::Config { action } => dispatch(Command::Config { action }, ctx),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// An open repository bound to its document.
///
/// Holds the repository lock until [`Session::close`] or drop.
pub struct Session {
    pub paths: FolioPaths,
    pub config: Config,
    pub workspace: Workspace,
    store: Arc<FileBackend>,
}

impl Session {
    /// Open the repository enclosing the context's directory.
    pub async fn open(ctx: &Context) -> Result<Self> {
        let cwd = ctx.cwd()?;
        let paths = FolioPaths::discover(&cwd).ok_or_else(|| {
            anyhow!(
                "Not a folio repository (or any parent): {}. Run 'folio init' first.",
                cwd.display()
            )
        })?;
        Self::open_at(ctx, paths).await
    }

    /// Open (creating the data directory if needed) the repository at `paths`.
    pub async fn open_at(ctx: &Context, paths: FolioPaths) -> Result<Self> {
        let config = Config::load(Some(&paths)).context("Failed to load config")?;
        let store = Arc::new(
            FileBackend::open(&paths)
                .await
                .context("Failed to open repository")?,
        );

        let document = ctx.document.clone().unwrap_or_else(|| config.document());
        let host = JsonFileDocument::new(paths.document_path(&document));
        let backend: Arc<dyn Backend> = store.clone();
        let workspace = Workspace::new(backend, Arc::new(host), Settings::from(&config));

        Ok(Self {
            paths,
            config,
            workspace,
            store,
        })
    }

    /// Release the store and its lock.
    pub async fn close(self) {
        self.store.close().await;
    }
}
