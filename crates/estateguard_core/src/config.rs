//! Core configuration and remote app settings.
//!
//! # Responsibility
//! - Load local runtime configuration from JSON with environment overrides.
//! - Model the shared `settings/app_config` document.
//!
//! # Invariants
//! - A loaded `CoreConfig` has passed `validate()`.
//! - Missing `AppSettings` fields fall back to defaults; unknown fields are ignored.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "ESTATEGUARD_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ESTATEGUARD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ESTATEGUARD_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "estateguard.sqlite3";
const DEFAULT_MIN_CLOCK_INTERVAL_MS: i64 = 5 * 60 * 1000;
const DEFAULT_RECENT_INCIDENT_LIMIT: u32 = 10;
const DEFAULT_LOG_MAX_FILE_MB: u32 = 10;
const DEFAULT_LOG_KEEP_FILES: u32 = 5;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Local runtime configuration for the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite cache file.
    pub db_path: PathBuf,
    /// Absolute log directory; file logging is skipped when `None`.
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    /// A log file rolls over once it reaches this size.
    pub log_max_file_mb: u32,
    /// Rolled log files kept on disk.
    pub log_keep_files: u32,
    /// Minimum gap between two clock entries of the same type.
    pub min_clock_interval_ms: i64,
    /// Number of incidents shown on the admin dashboard.
    pub recent_incident_limit: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_dir: None,
            log_level: default_log_level().to_string(),
            log_max_file_mb: DEFAULT_LOG_MAX_FILE_MB,
            log_keep_files: DEFAULT_LOG_KEEP_FILES,
            min_clock_interval_ms: DEFAULT_MIN_CLOCK_INTERVAL_MS,
            recent_incident_limit: DEFAULT_RECENT_INCIDENT_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config. Environment is not consulted.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file and applies `ESTATEGUARD_*` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus `ESTATEGUARD_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(db_path) = read(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(log_dir) = read(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(log_dir));
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path cannot be empty".to_string()));
        }
        if let Some(log_dir) = &self.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    log_dir.display()
                )));
            }
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level cannot be empty".to_string()));
        }
        if self.log_max_file_mb == 0 || self.log_keep_files == 0 {
            return Err(ConfigError::Invalid(
                "log_max_file_mb and log_keep_files must be greater than zero".to_string(),
            ));
        }
        if self.min_clock_interval_ms < 0 {
            return Err(ConfigError::Invalid(
                "min_clock_interval_ms cannot be negative".to_string(),
            ));
        }
        if self.recent_incident_limit == 0 {
            return Err(ConfigError::Invalid(
                "recent_incident_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared settings stored at `settings/app_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Pauses clocking and incident reporting in services built with these settings.
    pub maintenance_mode: bool,
    #[serde(rename = "maxPhotoSizeMB")]
    pub max_photo_size_mb: u32,
    pub max_incident_photos: u32,
    /// Meters.
    pub clock_in_radius: u32,
    pub auto_clock_out_hours: u32,
    pub incident_categories: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            max_photo_size_mb: 10,
            max_incident_photos: 5,
            clock_in_radius: 100,
            auto_clock_out_hours: 12,
            incident_categories: [
                "Security Breach",
                "Suspicious Activity",
                "Property Damage",
                "Medical Emergency",
                "Fire/Safety",
                "Noise Complaint",
                "Unauthorized Access",
                "Equipment Malfunction",
                "Other",
            ]
            .iter()
            .map(|category| category.to_string())
            .collect(),
        }
    }
}

impl AppSettings {
    pub fn max_photo_size_bytes(&self) -> usize {
        self.max_photo_size_mb as usize * 1024 * 1024
    }

    pub fn auto_clock_out_ms(&self) -> i64 {
        i64::from(self.auto_clock_out_hours) * 60 * 60 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::{AppSettings, ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use std::path::PathBuf;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CoreConfig::from_json_str(r#"{"db_path":"/tmp/guard.sqlite3"}"#)
            .expect("partial config should parse");
        assert_eq!(config.db_path, PathBuf::from("/tmp/guard.sqlite3"));
        assert_eq!(config.min_clock_interval_ms, 300_000);
        assert_eq!(config.recent_incident_limit, 10);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn zero_recent_limit_is_rejected() {
        let error = CoreConfig::from_json_str(r#"{"recent_incident_limit":0}"#)
            .expect_err("zero limit must fail");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn log_rotation_values_parse_and_validate() {
        let config = CoreConfig::from_json_str(r#"{"log_max_file_mb":2,"log_keep_files":3}"#)
            .expect("rotation config should parse");
        assert_eq!(config.log_max_file_mb, 2);
        assert_eq!(config.log_keep_files, 3);

        let error = CoreConfig::from_json_str(r#"{"log_keep_files":0}"#)
            .expect_err("zero kept files must fail");
        assert!(error.to_string().contains("log_keep_files"));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let error = CoreConfig::from_json_str(r#"{"log_dir":"logs"}"#)
            .expect_err("relative log dir must fail");
        assert!(error.to_string().contains("absolute"));
    }

    #[test]
    fn overrides_replace_values_and_ignore_blanks() {
        let config = CoreConfig::default().with_overrides(|key| match key {
            ENV_DB_PATH => Some("/data/cache.sqlite3".to_string()),
            ENV_LOG_LEVEL => Some("  ".to_string()),
            ENV_LOG_DIR => Some("/data/logs".to_string()),
            _ => None,
        });
        assert_eq!(config.db_path, PathBuf::from("/data/cache.sqlite3"));
        assert_eq!(config.log_level, CoreConfig::default().log_level);
        assert_eq!(config.log_dir, Some(PathBuf::from("/data/logs")));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("core.json");
        std::fs::write(&path, r#"{"min_clock_interval_ms": 60000}"#).expect("write config");
        let config = CoreConfig::load(&path).expect("config should load");
        assert_eq!(config.min_clock_interval_ms, 60_000);
    }

    #[test]
    fn load_reports_missing_file() {
        let error = CoreConfig::load("/nonexistent/estateguard.json").expect_err("must fail");
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn app_settings_accept_backend_document_shape() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"maintenanceMode":true,"maxPhotoSizeMB":4,"appVersion":"1.0.0"}"#,
        )
        .expect("settings should parse");
        assert!(settings.maintenance_mode);
        assert_eq!(settings.max_photo_size_mb, 4);
        assert_eq!(settings.auto_clock_out_hours, 12);
        assert_eq!(settings.max_photo_size_bytes(), 4 * 1024 * 1024);
        assert_eq!(settings.incident_categories.len(), 9);
    }
}
