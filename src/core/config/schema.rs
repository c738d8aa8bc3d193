//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$FOLIO_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/folio/config.toml`
//! 3. `~/.folio/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `<root>/.folio/config.toml`.
//!
//! # Validation
//!
//! Values are validated after parsing: the author must be non-empty and the
//! compression level must be a valid zstd level.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::delta::compress::LEVELS;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// author = "ada"
/// compression_level = 9
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Author recorded on new commits
    pub author: Option<String>,

    /// zstd level for new payloads
    pub compression_level: Option<i32>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(author) = &self.author {
            if author.trim().is_empty() {
                return Err(ConfigError::InvalidValue("author cannot be empty".into()));
            }
        }
        validate_level(self.compression_level)
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// name = "Poster"
/// document = "poster.json"
/// snapshot_interval = 50
/// compression_level = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Repository display name
    pub name: Option<String>,

    /// Tracked document, relative to the working root
    pub document: Option<String>,

    /// Store a full snapshot instead of a delta whenever the delta chain
    /// would reach this length (0 disables)
    pub snapshot_interval: Option<u32>,

    /// zstd level for new payloads
    pub compression_level: Option<i32>,
}

impl RepoConfig {
    /// Keys accepted by [`RepoConfig::get`] and [`RepoConfig::set`].
    pub const KEYS: &'static [&'static str] =
        &["name", "document", "snapshot_interval", "compression_level"];

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "repository name cannot be empty".into(),
                ));
            }
        }
        if let Some(document) = &self.document {
            if document.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "document path cannot be empty".into(),
                ));
            }
        }
        validate_level(self.compression_level)
    }

    /// The configured value of `key`, rendered as text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownKey` for keys outside [`RepoConfig::KEYS`].
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(match key {
            "name" => self.name.clone(),
            "document" => self.document.clone(),
            "snapshot_interval" => self.snapshot_interval.map(|v| v.to_string()),
            "compression_level" => self.compression_level.map(|v| v.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        })
    }

    /// Parse and set `key`.
    ///
    /// # Example
    ///
    /// ```
    /// use folio::core::config::RepoConfig;
    ///
    /// let mut config = RepoConfig::default();
    /// config.set("snapshot_interval", "25").unwrap();
    /// assert_eq!(config.snapshot_interval, Some(25));
    ///
    /// assert!(config.set("compression_level", "99").is_err());
    /// assert!(config.set("colour", "blue").is_err());
    /// ```
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match key {
            "name" => next.name = Some(value.to_string()),
            "document" => next.document = Some(value.to_string()),
            "snapshot_interval" => next.snapshot_interval = Some(parse(key, value)?),
            "compression_level" => next.compression_level = Some(parse(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{key}: {e}")))
}

fn validate_level(level: Option<i32>) -> Result<(), ConfigError> {
    match level {
        Some(level) if !LEVELS.contains(&level) => Err(ConfigError::InvalidValue(format!(
            "compression_level must be between {} and {}, got {}",
            LEVELS.start(),
            LEVELS.end(),
            level
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global {
        use super::*;

        #[test]
        fn parses_and_validates() {
            let config: GlobalConfig = toml::from_str("author = \"ada\"").unwrap();
            assert_eq!(config.author.as_deref(), Some("ada"));
            config.validate().unwrap();
        }

        #[test]
        fn blank_author_rejected() {
            let config = GlobalConfig {
                author: Some("  ".into()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn unknown_fields_rejected() {
            assert!(toml::from_str::<GlobalConfig>("colour = \"blue\"").is_err());
        }
    }

    mod repo {
        use super::*;

        #[test]
        fn get_unset_is_none() {
            assert_eq!(RepoConfig::default().get("name").unwrap(), None);
        }

        #[test]
        fn get_unknown_key_errors() {
            assert!(matches!(
                RepoConfig::default().get("nope"),
                Err(ConfigError::UnknownKey(_))
            ));
        }

        #[test]
        fn set_rejects_bad_number_without_changing() {
            let mut config = RepoConfig::default();
            config.set("snapshot_interval", "10").unwrap();
            assert!(config.set("snapshot_interval", "ten").is_err());
            assert_eq!(config.snapshot_interval, Some(10));
        }

        #[test]
        fn level_bounds() {
            let mut config = RepoConfig::default();
            config.set("compression_level", "22").unwrap();
            assert!(config.set("compression_level", "0").is_err());
            assert_eq!(config.compression_level, Some(22));
        }

        #[test]
        fn every_key_roundtrips_through_get() {
            let mut config = RepoConfig::default();
            for (key, value) in [
                ("name", "Poster"),
                ("document", "poster.json"),
                ("snapshot_interval", "5"),
                ("compression_level", "7"),
            ] {
                config.set(key, value).unwrap();
                assert_eq!(config.get(key).unwrap().as_deref(), Some(value));
            }
            assert_eq!(RepoConfig::KEYS.len(), 4);
        }
    }
}
