//! Configuration builders for tests.

use std::path::{Path, PathBuf};

use connidx_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .library(lib.path())
///     .reindex_delay_ms(50)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Append a package library to scan.
    pub fn library(mut self, path: impl AsRef<Path>) -> Self {
        self.config.library.paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn resource_path(mut self, path: &str) -> Self {
        self.config.library.resource_path = PathBuf::from(path);
        self
    }

    pub fn reindex_delay_ms(mut self, ms: u64) -> Self {
        self.config.indexer.reindex_delay_ms = ms;
        self
    }

    pub fn scan_timeout_secs(mut self, secs: u64) -> Self {
        self.config.indexer.scan_timeout_secs = secs;
        self
    }

    pub fn disable_packages(mut self, disabled: bool) -> Self {
        self.config.indexer.disable_packages = disabled;
        self
    }

    /// Set the active project and turn on load-all mode.
    pub fn load_all(mut self, root: impl AsRef<Path>, package: &str) -> Self {
        self.config.project.root = Some(root.as_ref().to_path_buf());
        self.config.project.package = Some(package.to_string());
        self.config.project.load_all = true;
        self
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.daemon.socket_path = Some(path.as_ref().display().to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
