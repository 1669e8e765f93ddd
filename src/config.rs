//! On-disk configuration for the `jpr` tool.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that overrides the database location.
pub const DB_ENV_VAR: &str = "JPR_DB";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; falls back to the per-user data directory
    pub path: Option<PathBuf>,
}

/// Alert thresholds and measurement windows for health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Share of failed interactions (0.0 - 1.0) that raises an alert
    #[serde(default = "default_high_error_rate")]
    pub high_error_rate: f64,

    #[serde(default = "default_slow_response_time_secs")]
    pub slow_response_time_secs: f64,

    #[serde(default = "default_high_session_count")]
    pub high_session_count: i64,

    /// Workflow completion share below which an alert is raised
    #[serde(default = "default_low_completion_rate")]
    pub low_completion_rate: f64,

    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    #[serde(default = "default_completion_window_minutes")]
    pub completion_window_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_telemetry_days")]
    pub telemetry_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_high_error_rate() -> f64 {
    0.1
}

fn default_slow_response_time_secs() -> f64 {
    5.0
}

fn default_high_session_count() -> i64 {
    100
}

fn default_low_completion_rate() -> f64 {
    0.3
}

fn default_window_minutes() -> i64 {
    5
}

fn default_completion_window_minutes() -> i64 {
    60
}

fn default_telemetry_days() -> i64 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            high_error_rate: default_high_error_rate(),
            slow_response_time_secs: default_slow_response_time_secs(),
            high_session_count: default_high_session_count(),
            low_completion_rate: default_low_completion_rate(),
            window_minutes: default_window_minutes(),
            completion_window_minutes: default_completion_window_minutes(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            telemetry_days: default_telemetry_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Directory holding `config.toml` and the default database.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("jpr"))
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Database location: `JPR_DB`, then `database.path`, then the
    /// per-user config directory.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        self.resolve_db_path_from(std::env::var_os(DB_ENV_VAR).map(PathBuf::from))
    }

    fn resolve_db_path_from(&self, env: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(p) = env.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(p);
        }
        if let Some(p) = &self.database.path {
            return Ok(p.clone());
        }
        Ok(Self::config_dir()?.join("jpr.db"))
    }
}
