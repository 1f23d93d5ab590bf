//! Configuration management for upkeep.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Priority;
use crate::validate::{ContactRules, DEFAULT_PHONE_PATTERN};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "upkeep";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "upkeep.db";

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "UPKEEP_";

/// Largest busy timeout SQLite accepts, in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = i32::MAX as u64;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `UPKEEP_`, sections separated by
///    `__`, e.g. `UPKEEP_STORAGE__DATABASE_PATH`)
/// 2. TOML config file at `~/.config/upkeep/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Workflow configuration.
    pub workflow: WorkflowConfig,
    /// Session configuration.
    pub session: SessionConfig,
    /// Display configuration.
    pub display: DisplayConfig,
    /// Input validation configuration.
    pub validation: ValidationConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/upkeep/upkeep.db`
    pub database_path: Option<PathBuf>,
    /// How long a writer waits for another writer's lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Workflow-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Priority given to reports that do not name one.
    pub default_priority: Priority,
}

/// Session-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// User to act as when `--as` is not given.
    pub actor_id: Option<i64>,
}

/// Display-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Default maximum number of rows in listings.
    pub list_limit: usize,
    /// `chrono` format string for timestamps in plain and table output.
    pub date_format: String,
}

/// Input validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Regex a phone number must match.
    pub phone_pattern: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            list_limit: 50,
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            phone_pattern: DEFAULT_PHONE_PATTERN.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `UPKEEP_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.busy_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "busy_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.storage.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}, got {}",
                    self.storage.busy_timeout_ms
                ),
            });
        }

        if self.display.list_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "list_limit must be greater than 0".to_string(),
            });
        }

        if self.display.date_format.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "date_format must not be empty".to_string(),
            });
        }

        if StrftimeItems::new(&self.display.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "date_format '{}' is not a valid strftime format",
                    self.display.date_format
                ),
            });
        }

        if let Some(actor_id) = self.session.actor_id {
            if actor_id <= 0 {
                return Err(Error::ConfigValidation {
                    message: format!("session.actor_id must be positive, got {actor_id}"),
                });
            }
        }

        self.contact_rules()?;
        Ok(())
    }

    /// Compile the contact validation rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the phone pattern is not a valid regex.
    pub fn contact_rules(&self) -> Result<ContactRules> {
        ContactRules::new(&self.validation.phone_pattern)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }
}
