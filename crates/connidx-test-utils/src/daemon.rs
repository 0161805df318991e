//! Daemon test helpers.
//!
//! Helpers for constructing [`Daemon`] instances in tests with a private
//! socket and a config file on disk.

use std::path::PathBuf;

use connidx_config::AppConfig;
use connidx_core::Daemon;
use tempfile::TempDir;

/// A test-scoped daemon with an owned temp directory for its config file
/// and IPC socket.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestDaemon {
    pub daemon: Daemon,
    pub config_path: PathBuf,
    pub socket_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestDaemon {
    /// Create a daemon from the given TOML, with `daemon.socket_path`
    /// pointed into the temp directory.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("connidx.toml");
        let socket_path = temp_dir.path().join("connidx.sock");

        tokio::fs::write(&config_path, toml_content)
            .await
            .expect("failed to write test config");

        let mut config = AppConfig::load(&config_path)
            .await
            .expect("failed to parse test config");
        config.daemon.socket_path = Some(socket_path.display().to_string());

        let daemon = Daemon::with_config_path(config, config_path.clone());

        Self {
            daemon,
            config_path,
            socket_path,
            _temp_dir: temp_dir,
        }
    }

    /// Create a daemon with default config in a temp directory.
    pub async fn default_config() -> Self {
        Self::with_toml("").await
    }
}
