//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Folio has two configuration scopes:
//! - **Global**: User-level settings (author, compression level)
//! - **Repo**: Repository-level settings and overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$FOLIO_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/folio/config.toml`
//! 3. `~/.folio/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use folio::core::config::Config;
//! use folio::core::paths::FolioPaths;
//!
//! let paths = FolioPaths::new("/path/to/work");
//! let config = Config::load(Some(&paths)).unwrap();
//!
//! println!("Author: {}", config.author());
//! println!("Document: {}", config.document().display());
//! println!("Snapshot every: {}", config.snapshot_interval());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::delta::compress::DEFAULT_LEVEL;
use crate::core::paths::FolioPaths;
use crate::core::schema::DEFAULT_AUTHOR;

/// Repository name used when none is configured.
pub const DEFAULT_REPOSITORY_NAME: &str = "Main Repository";

/// Document file used when none is configured.
pub const DEFAULT_DOCUMENT: &str = "document.json";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo config overrides global config, which
/// overrides the defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if a repository was given)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated. Missing files are not an error.
    pub fn load(repo: Option<&FolioPaths>) -> Result<Self, ConfigError> {
        let global = Self::find_global();
        Self::load_from(global.as_deref(), repo)
    }

    /// Load configuration from an explicit global file.
    pub fn load_from(global: Option<&Path>, repo: Option<&FolioPaths>) -> Result<Self, ConfigError> {
        let (global_config, global_path) = match global {
            Some(path) if path.exists() => (read_toml::<GlobalConfig>(path)?, Some(path.to_path_buf())),
            _ => (GlobalConfig::default(), None),
        };

        let (repo_config, repo_path) = match repo {
            Some(paths) => {
                let path = paths.config_path();
                if path.exists() {
                    (Some(read_toml::<RepoConfig>(&path)?), Some(path))
                } else {
                    (Some(RepoConfig::default()), None)
                }
            }
            None => (None, None),
        };

        global_config.validate()?;
        if let Some(repo) = &repo_config {
            repo.validate()?;
        }

        Ok(Config {
            global: global_config,
            repo: repo_config,
            global_path,
            repo_path,
        })
    }

    /// The first existing global config file.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FOLIO_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("folio/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".folio/config.toml"))
            .filter(|path| path.exists())
    }

    /// Get the canonical path for global config: `~/.folio/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".folio/config.toml"))
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write repo config atomically.
    pub fn write_repo(paths: &FolioPaths, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.config_path();
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Author recorded on new commits. Defaults to `"user"`.
    pub fn author(&self) -> &str {
        self.global.author.as_deref().unwrap_or(DEFAULT_AUTHOR)
    }

    /// Repository name used at initialization.
    pub fn repository_name(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .unwrap_or(DEFAULT_REPOSITORY_NAME)
    }

    /// Tracked document, relative to the working root.
    pub fn document(&self) -> PathBuf {
        PathBuf::from(
            self.repo
                .as_ref()
                .and_then(|r| r.document.as_deref())
                .unwrap_or(DEFAULT_DOCUMENT),
        )
    }

    /// Maximum delta chain length before a snapshot is forced. 0 disables.
    pub fn snapshot_interval(&self) -> u32 {
        self.repo
            .as_ref()
            .and_then(|r| r.snapshot_interval)
            .unwrap_or(0)
    }

    /// zstd level for new payloads. Repo overrides global.
    pub fn compression_level(&self) -> i32 {
        self.repo
            .as_ref()
            .and_then(|r| r.compression_level)
            .or(self.global.compression_level)
            .unwrap_or(DEFAULT_LEVEL)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a config file through a synced temp file and a rename.
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
