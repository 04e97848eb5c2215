//! Rolling file logs and log-field redaction.
//!
//! # Responsibility
//! - Start file logging once per process, rotated by `CoreConfig` limits.
//! - Provide the helpers that keep user data out of log lines.
//!
//! # Invariants
//! - Events carry metadata only. Ids pass through `redact_id`, free text
//!   through `log_text`. Emails and descriptions are never logged.
//! - A second init must match the active settings exactly, or it is rejected.
//! - Initialization never panics.

use crate::config::CoreConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::Display;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "estateguard";
const BYTES_PER_MB: u64 = 1024 * 1024;
const DEFAULT_MAX_FILE_MB: u32 = 10;
const DEFAULT_KEEP_FILES: u32 = 5;
const MAX_LOGGED_TEXT_CHARS: usize = 160;
const REDACTED_ID_PREFIX_CHARS: usize = 4;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

/// Validated logger setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: &'static str,
    pub log_dir: PathBuf,
    pub max_file_mb: u32,
    pub keep_files: u32,
}

impl LogSettings {
    /// Level and directory with default rotation limits.
    pub fn new(level: &str, log_dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: normalize_level(level)?,
            log_dir: normalize_log_dir(log_dir)?,
            max_file_mb: DEFAULT_MAX_FILE_MB,
            keep_files: DEFAULT_KEEP_FILES,
        })
    }

    /// Returns `Ok(None)` when the config has no `log_dir`.
    pub fn from_config(config: &CoreConfig) -> Result<Option<Self>, String> {
        let Some(log_dir) = config.log_dir.as_deref() else {
            return Ok(None);
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: `{}`", log_dir.display()))?;
        let mut settings = Self::new(&config.log_level, log_dir)?;
        if config.log_max_file_mb == 0 || config.log_keep_files == 0 {
            return Err("log rotation limits must be greater than zero".to_string());
        }
        settings.max_file_mb = config.log_max_file_mb;
        settings.keep_files = config.log_keep_files;
        Ok(Some(settings))
    }

    fn max_file_bytes(&self) -> u64 {
        u64::from(self.max_file_mb) * BYTES_PER_MB
    }

    fn conflict_with(&self, requested: &Self) -> Option<String> {
        if self.log_dir != requested.log_dir {
            return Some(format!(
                "logging already initialized at `{}`; refusing to switch to `{}`",
                self.log_dir.display(),
                requested.log_dir.display()
            ));
        }
        if self.level != requested.level {
            return Some(format!(
                "logging already initialized with level `{}`; refusing to switch to `{}`",
                self.level, requested.level
            ));
        }
        if (self.max_file_mb, self.keep_files) != (requested.max_file_mb, requested.keep_files) {
            return Some(format!(
                "logging already initialized with rotation {}MB x{}; refusing to switch to {}MB x{}",
                self.max_file_mb, self.keep_files, requested.max_file_mb, requested.keep_files
            ));
        }
        None
    }
}

struct LoggingState {
    settings: LogSettings,
    _logger: LoggerHandle,
}

/// Initializes core logging with level and directory and default rotation.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when logging is already active with other settings.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    start_logging(LogSettings::new(level, log_dir)?)
}

/// Starts logging from `CoreConfig`.
///
/// Returns `Ok(false)` without touching the logger when `log_dir` is unset.
pub fn init_from_config(config: &CoreConfig) -> Result<bool, String> {
    match LogSettings::from_config(config)? {
        Some(settings) => start_logging(settings).map(|()| true),
        None => Ok(false),
    }
}

/// Starts the file logger, or checks that the active one matches `settings`.
pub fn start_logging(settings: LogSettings) -> Result<(), String> {
    let state = LOGGING_STATE.get_or_try_init(|| build_logger(settings.clone()))?;
    match state.settings.conflict_with(&settings) {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

fn build_logger(settings: LogSettings) -> Result<LoggingState, String> {
    std::fs::create_dir_all(&settings.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            settings.log_dir.display()
        )
    })?;

    let logger = Logger::try_with_str(settings.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", settings.level))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(settings.max_file_bytes()),
            Naming::Numbers,
            Cleanup::KeepLogFiles(settings.keep_files as usize),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();

    info!(
        "event=app_start module=core status=ok platform={} version={}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "event=core_init module=core status=ok level={} max_file_mb={} keep_files={}",
        settings.level, settings.max_file_mb, settings.keep_files
    );

    Ok(LoggingState {
        settings,
        _logger: logger,
    })
}

/// Returns `(level, log_dir)` while file logging is active.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.settings.level, state.settings.log_dir.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Shortens a record or user id to a prefix that still groups related lines.
pub fn redact_id(id: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        return "-".to_string();
    }
    let prefix: String = id.chars().take(REDACTED_ID_PREFIX_CHARS).collect();
    format!("{prefix}***")
}

/// Renders an error or message as one bounded log field.
pub fn log_text(value: impl Display) -> String {
    sanitize_message(&value.to_string(), MAX_LOGGED_TEXT_CHARS)
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        // Payload may echo incident text.
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            log_text(message)
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            log_text(message)
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
