//! # Dispensary Configuration
//!
//! Where the database lives and how the ledger behaves.
//!
//! A value is taken from the first place that sets it:
//!
//! | Source | Example |
//! |--------|---------|
//! | `DISPENSARY_DB_PATH` | `/srv/clinic/dispensary.db` |
//! | `DISPENSARY_MAX_CONNECTIONS` | `8` |
//! | `DISPENSARY_ENFORCE_STOCK_FLOOR` | `true` |
//! | `dispensary.toml` in the platform config dir | see below |
//! | built-in defaults | platform data dir, 5 connections, floor off |
//!
//! ```toml
//! [database]
//! path = "/srv/clinic/dispensary.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [ledger]
//! enforce_stock_floor = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;

const CONFIG_FILE_NAME: &str = "dispensary.toml";
const DATABASE_FILE_NAME: &str = "dispensary.db";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "clinic", "dispensary")
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first connect.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the write lock before giving up.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// Ledger behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Reject prescriptions and adjustments that would drive a medicine's
    /// stock below zero with `InsufficientStock`.
    /// Off by default.
    #[serde(default)]
    pub enforce_stock_floor: bool,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispensaryConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl DispensaryConfig {
    /// Defaults, then `dispensary.toml` (from `config_path` or the platform
    /// config dir), then `DISPENSARY_*` variables. The result is validated.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Reading dispensary.toml");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "No dispensary.toml, starting from defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Like [`load`](Self::load), but a broken file only costs a warning.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unusable dispensary config");
            Self::default()
        })
    }

    /// Writes the config as TOML, creating the directory if needed.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Dispensary config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `DISPENSARY_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DISPENSARY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("DISPENSARY_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Invalid DISPENSARY_MAX_CONNECTIONS"),
            }
        }

        if let Some(flag) = lookup("DISPENSARY_ENFORCE_STOCK_FLOOR") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.ledger.enforce_stock_floor = true,
                "0" | "false" | "no" | "off" => self.ledger.enforce_stock_floor = false,
                _ => warn!(value = %flag, "Invalid DISPENSARY_ENFORCE_STOCK_FLOOR"),
            }
        }
    }

    /// `<platform config dir>/dispensary.toml`, when the platform has one.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }
}
