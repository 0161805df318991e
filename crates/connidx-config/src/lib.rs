#![deny(unsafe_code)]

//! Configuration loading and validation for connidx.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Every section is optional; [`AppConfig::default`] describes a session that
//! scans no libraries and has no active project.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Package libraries to scan.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Indexer and trigger tuning.
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// The active project, if any.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Daemon configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Package library locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library directories, scanned in order. Each immediate subdirectory is
    /// treated as an installed package.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Descriptor file location relative to each package directory.
    #[serde(default = "default_resource_path")]
    pub resource_path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            resource_path: default_resource_path(),
        }
    }
}

fn default_resource_path() -> PathBuf {
    PathBuf::from("rstudio/connections.dcf")
}

/// Indexer and trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Delay before a console-triggered re-index runs, in milliseconds.
    #[serde(default = "default_reindex_delay_ms")]
    pub reindex_delay_ms: u64,

    /// Soft deadline for one scan pass in seconds (0 = unbounded).
    #[serde(default)]
    pub scan_timeout_secs: u64,

    /// Disable console-input triggers (mirrors a disabled packages pane).
    #[serde(default)]
    pub disable_packages: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            reindex_delay_ms: default_reindex_delay_ms(),
            scan_timeout_secs: 0,
            disable_packages: false,
        }
    }
}

fn default_reindex_delay_ms() -> u64 {
    1000
}

impl IndexerConfig {
    /// The console-trigger delay as a [`Duration`].
    pub fn reindex_delay(&self) -> Duration {
        Duration::from_millis(self.reindex_delay_ms)
    }

    /// The scan deadline, or `None` when scans are unbounded.
    pub fn scan_timeout(&self) -> Option<Duration> {
        (self.scan_timeout_secs > 0).then(|| Duration::from_secs(self.scan_timeout_secs))
    }
}

/// The project currently open in the session.
///
/// When `load_all` is set the project is a package under development whose
/// own descriptor file is indexed after every pass.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project (package source) root directory.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Package name declared by the project.
    #[serde(default)]
    pub package: Option<String>,

    /// Whether the package is loaded in place for development.
    #[serde(default)]
    pub load_all: bool,
}

/// Configuration for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket path for IPC. Falls back to the built-in default.
    #[serde(default)]
    pub socket_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resource = &self.library.resource_path;
        if resource.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "library.resource_path must not be empty".to_string(),
            ));
        }
        if resource.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "library.resource_path must be relative to the package directory, got {:?}",
                resource
            )));
        }
        for (i, path) in self.library.paths.iter().enumerate() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "library.paths[{i}] must not be empty"
                )));
            }
        }

        if self.indexer.reindex_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "indexer.reindex_delay_ms must be non-zero".to_string(),
            ));
        }

        if self.project.load_all {
            if self.project.root.is_none() {
                return Err(ConfigError::Validation(
                    "project.root is required when project.load_all is true".to_string(),
                ));
            }
            if self.project.package.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Validation(
                    "project.package is required when project.load_all is true".to_string(),
                ));
            }
        }

        if let Some(socket) = &self.daemon.socket_path
            && socket.is_empty()
        {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty when set".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
