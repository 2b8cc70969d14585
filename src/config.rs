use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::preferences::ColorScheme;
use crate::utils;
use crate::views::DAY_VIEW_HOURS;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_notification_poll_secs")]
    pub notification_poll_secs: u64,
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,
    /// "auto", "light" or "dark"; used when the theme is "system"
    #[serde(default = "default_color_scheme")]
    pub color_scheme: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            notification_poll_secs: default_notification_poll_secs(),
            day_start_hour: default_day_start_hour(),
            day_end_hour: default_day_end_hour(),
            color_scheme: default_color_scheme(),
            log_filter: default_log_filter(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    Config::default_database_path_for_profile(utils::Profile::Prod)
}

fn default_notification_poll_secs() -> u64 {
    60
}

fn default_day_start_hour() -> u32 {
    *DAY_VIEW_HOURS.start()
}

fn default_day_end_hour() -> u32 {
    *DAY_VIEW_HOURS.end()
}

fn default_color_scheme() -> String {
    "auto".to_string()
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_profile(profile);
        Ok(config)
    }

    /// Point a database path left at the prod default at `profile`'s data
    /// directory. Explicitly configured paths are kept.
    pub fn apply_profile(&mut self, profile: utils::Profile) {
        if self.database_path == default_database_path() {
            self.database_path = Self::default_database_path_for_profile(profile);
        }
    }

    /// Load configuration from an explicit path, creating it with defaults if missing
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            Ok(toml::from_str(&contents)?)
        } else {
            let mut config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from file, using production profile
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_profile(utils::Profile::Prod)
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to(&config_path)
    }

    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("lifeflow.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/lifeflow-dev/lifeflow.db".to_string(),
                utils::Profile::Prod => "~/.local/share/lifeflow/lifeflow.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs.max(1))
    }

    /// Hours shown in the day view, clamped to a valid, non-empty range
    pub fn day_hours(&self) -> std::ops::RangeInclusive<u32> {
        let start = self.day_start_hour.min(23);
        let end = self.day_end_hour.clamp(start, 23);
        start..=end
    }

    /// The OS color scheme signal described by `color_scheme`
    pub fn color_scheme(&self) -> ColorScheme {
        match self.color_scheme.as_str() {
            "dark" => ColorScheme::new(true),
            "light" => ColorScheme::new(false),
            "auto" => ColorScheme::from_env(),
            other => {
                warn!(value = other, "unknown color_scheme in config, detecting from environment");
                ColorScheme::from_env()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.notification_poll_secs, 60);
        assert_eq!(config.day_hours(), 8..=21);
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "color_scheme = \"dark\"\nday_start_hour = 6\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.day_hours(), 6..=21);
        assert!(config.color_scheme().prefers_dark());
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "day_start_hour = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn dev_profile_moves_default_database_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        config.apply_profile(utils::Profile::Dev);
        assert_eq!(
            config.database_path,
            Config::default_database_path_for_profile(utils::Profile::Dev)
        );
        assert_ne!(config.database_path, default_database_path());

        fs::write(&path, "database_path = \"/srv/lifeflow/shared.db\"\n").unwrap();
        let mut config = Config::load_from(&path).unwrap();
        config.apply_profile(utils::Profile::Dev);
        assert_eq!(config.database_path, "/srv/lifeflow/shared.db");
    }

    #[test]
    fn inverted_day_range_is_clamped() {
        let config = Config {
            day_start_hour: 20,
            day_end_hour: 9,
            ..Config::default()
        };
        assert_eq!(config.day_hours(), 20..=20);
    }
}
