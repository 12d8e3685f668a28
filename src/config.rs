//! Configuration for parallelizer
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PARALLELIZER_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::executor::{default_worker_count, ExecutionMode};
use crate::process::WorkerCommand;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelizerConfig {
    /// Worker pool settings
    pub pool: PoolSettings,

    /// Progress bar settings
    pub progress: ProgressSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Number of workers (0 = all CPUs but one)
    pub workers: usize,

    /// Default execution mode: threads or processes
    pub mode: ExecutionMode,

    /// Sleep between process-mode polling passes, in milliseconds
    pub poll_interval_ms: u64,

    /// Worker executable for process mode (unset = this executable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<String>,

    /// Arguments passed to the worker executable
    pub worker_args: Vec<String>,
}

/// Progress bar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Draw a progress bar while tasks run
    pub enabled: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// ─────────────────────────────────────────────────────────────────
// Default implementations
// ─────────────────────────────────────────────────────────────────

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            mode: ExecutionMode::Threads,
            poll_interval_ms: 50,
            worker_program: None,
            worker_args: vec!["worker".to_string()],
        }
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl PoolSettings {
    /// `None` when the worker count is left to the CPU count
    pub fn requested_workers(&self) -> Option<usize> {
        (self.workers > 0).then_some(self.workers)
    }

    /// Worker count this configuration resolves to
    pub fn effective_workers(&self) -> usize {
        self.requested_workers().unwrap_or_else(default_worker_count)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Command for process-mode workers, if one is configured. Without one
    /// the pool re-runs the current executable.
    pub fn worker_command(&self) -> Option<WorkerCommand> {
        self.worker_program
            .as_ref()
            .map(|program| WorkerCommand::new(program, self.worker_args.iter()))
    }
}

impl ParallelizerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e),
            source: Some(e),
        })?;
        info!(path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            return if path.exists() {
                Ok(Some(path))
            } else {
                Err(Error::config_not_found(path))
            };
        }

        let search_paths = [
            // Current directory
            Some(PathBuf::from("parallelizer.toml")),
            // User config directory
            dirs::config_dir().map(|p| p.join("parallelizer").join("config.toml")),
            // Home directory
            dirs::home_dir().map(|p| p.join(".parallelizer").join("config.toml")),
        ];

        for path in search_paths.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PARALLELIZER_WORKERS") {
            if let Ok(n) = val.parse() {
                self.pool.workers = n;
            }
        }
        if let Ok(val) = std::env::var("PARALLELIZER_MODE") {
            if let Ok(mode) = val.parse() {
                self.pool.mode = mode;
            }
        }
        if let Ok(val) = std::env::var("PARALLELIZER_POLL_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.pool.poll_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("PARALLELIZER_WORKER_PROGRAM") {
            self.pool.worker_program = Some(val);
        }

        if let Ok(val) = std::env::var("PARALLELIZER_PROGRESS") {
            self.progress.enabled = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("PARALLELIZER_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PARALLELIZER_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PARALLELIZER_LOG_JSON") {
            self.logging.json_format = parse_flag(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref program) = self.pool.worker_program {
            self.pool.worker_program = Some(expand_path(program));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool.poll_interval_ms == 0 {
            return Err(Error::config_field_invalid(
                "pool.poll_interval_ms",
                "poll_interval_ms must be at least 1",
            ));
        }

        if matches!(&self.pool.worker_program, Some(program) if program.trim().is_empty()) {
            return Err(Error::config_field_invalid(
                "pool.worker_program",
                "worker_program cannot be empty (remove it to use this executable)",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parallelizer")
        .join("config.toml")
}

/// Write a commented default configuration file, returning its path
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# parallelizer configuration

[pool]
# Number of workers (0 = all CPUs but one)
workers = 0

# Default execution mode: "threads" or "processes"
mode = "threads"

# Sleep between polling passes over worker processes (milliseconds)
poll_interval_ms = 50

# Worker executable for process mode (defaults to this executable)
# worker_program = "/usr/local/bin/parallelizer"

# Arguments passed to the worker executable
worker_args = ["worker"]

[progress]
# Draw a progress bar while tasks run
enabled = true

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (uncomment to enable file logging)
# file = "~/.parallelizer/logs/parallelizer.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
