//! config command - Get, set, or list configuration values
//!
//! `author` lives in the global config; every other key belongs to the
//! repository's `.folio/config.toml`.

use anyhow::{anyhow, bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::{Config, RepoConfig};
use crate::core::paths::FolioPaths;
use crate::ui::output;

/// Global keys.
const GLOBAL_KEYS: &[&str] = &["author"];

fn discover(ctx: &Context) -> Result<Option<FolioPaths>> {
    Ok(FolioPaths::discover(&ctx.cwd()?))
}

fn effective(config: &Config, key: &str) -> Result<String> {
    Ok(match key {
        "author" => config.author().to_string(),
        "name" => config.repository_name().to_string(),
        "document" => config.document().display().to_string(),
        "snapshot_interval" => config.snapshot_interval().to_string(),
        "compression_level" => config.compression_level().to_string(),
        _ => bail!("Unknown configuration key: {}", key),
    })
}

/// Print the effective value of a key.
pub fn get(ctx: &Context, key: &str) -> Result<()> {
    let paths = discover(ctx)?;
    let config = Config::load(paths.as_ref()).context("Failed to load config")?;
    println!("{}", effective(&config, key)?);
    Ok(())
}

/// Set a key in the config file it belongs to.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let paths = discover(ctx)?;
    let config = Config::load(paths.as_ref()).context("Failed to load config")?;

    let written = if GLOBAL_KEYS.contains(&key) {
        let mut global = config.global;
        if value.trim().is_empty() {
            bail!("author cannot be empty");
        }
        global.author = Some(value.to_string());
        Config::write_global(&global).context("Failed to write global config")?
    } else if RepoConfig::KEYS.contains(&key) {
        let paths = paths
            .ok_or_else(|| anyhow!("Not a folio repository. Run 'folio init' first."))?;
        let mut repo = config.repo.unwrap_or_default();
        repo.set(key, value)?;
        Config::write_repo(&paths, &repo).context("Failed to write config")?
    } else {
        bail!("Unknown configuration key: {}", key);
    };

    output::print(
        format!("Set {} = {} in {}", key, value, written.display()),
        ctx.verbosity(),
    );
    Ok(())
}

/// List every key with its effective value.
pub fn list(ctx: &Context) -> Result<()> {
    let paths = discover(ctx)?;
    let config = Config::load(paths.as_ref()).context("Failed to load config")?;

    if let Some(path) = config.global_config_loaded_from() {
        println!("# global: {}", path.display());
    }
    if let Some(path) = config.repo_config_loaded_from() {
        println!("# repository: {}", path.display());
    }
    for key in GLOBAL_KEYS.iter().chain(RepoConfig::KEYS) {
        println!("{} = {}", key, effective(&config, key)?);
    }
    Ok(())
}
