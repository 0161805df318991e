//! Daemon process: startup, deferred init, IPC serving, and shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{info, warn};

use connidx_config::AppConfig;

use crate::connections::ConnectionsModule;
use crate::host::{ConfiguredHost, TokioScheduler};
use crate::ipc::{self, IpcState};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The connidx daemon. Owns one [`ConnectionsModule`] and the session seams
/// it runs against.
pub struct Daemon {
    config: AppConfig,
    config_path: Option<PathBuf>,
    host: Arc<ConfiguredHost>,
    scheduler: Arc<TokioScheduler>,
    connections: Arc<ConnectionsModule>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    _shutdown_rx: broadcast::Receiver<ShutdownSignal>,
}

impl Daemon {
    pub fn new(config: AppConfig) -> Self {
        let host = Arc::new(ConfiguredHost::from_config(&config));
        let scheduler = Arc::new(TokioScheduler::new());
        let connections = Arc::new(ConnectionsModule::new(
            &config,
            host.clone(),
            scheduler.clone(),
        ));
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        Self {
            config,
            config_path: None,
            host,
            scheduler,
            connections,
            shutdown_tx,
            _shutdown_rx,
        }
    }

    /// Create a daemon that remembers which file its config came from.
    pub fn with_config_path(config: AppConfig, path: impl Into<PathBuf>) -> Self {
        let mut daemon = Self::new(config);
        daemon.config_path = Some(path.into());
        daemon
    }

    /// Run deferred init, then serve IPC until `/stop` or Ctrl-C.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let socket_path = ipc::socket_path_from_config(&self.config);
        info!(
            socket = %socket_path.display(),
            libraries = self.config.library.paths.len(),
            config = ?self.config_path,
            "connidx daemon starting"
        );

        self.connections.on_deferred_init();

        let state = Arc::new(IpcState {
            connections: Arc::clone(&self.connections),
            scheduler: Arc::clone(&self.scheduler),
            shutdown_tx: self.shutdown_tx.clone(),
            started_at: Instant::now(),
        });
        let server = ipc::serve(&socket_path, state, self.shutdown_tx.subscribe());

        tokio::select! {
            result = server => {
                result.map_err(|e| DaemonError::Ipc {
                    path: socket_path.clone(),
                    source: e,
                })?;
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = self.shutdown_tx.send(ShutdownSignal);
                std::fs::remove_file(&socket_path).ok();
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn connections(&self) -> &Arc<ConnectionsModule> {
        &self.connections
    }

    /// Session seams, for embedding hosts that update them at runtime.
    pub fn host(&self) -> &Arc<ConfiguredHost> {
        &self.host
    }

    pub fn scheduler(&self) -> &Arc<TokioScheduler> {
        &self.scheduler
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("IPC server on {path} failed: {source}")]
    Ipc {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_daemon_creation() {
        let daemon = Daemon::new(AppConfig::default());
        assert!(daemon.config_path().is_none());
        assert_eq!(daemon.connections().indexer().passes_completed(), 0);
        assert!(daemon.connections().registry().is_empty());
    }

    #[tokio::test]
    async fn test_with_config_path() {
        let daemon = Daemon::with_config_path(AppConfig::default(), "/etc/connidx.toml");
        assert_eq!(daemon.config_path(), Some(Path::new("/etc/connidx.toml")));
    }

    #[tokio::test]
    async fn test_run_indexes_and_stops_on_shutdown() {
        let mut config = AppConfig::default();
        let sock = std::env::temp_dir().join(format!("connidx-daemon-{}.sock", std::process::id()));
        config.daemon.socket_path = Some(sock.display().to_string());

        let daemon = Arc::new(Daemon::new(config));
        let runner = Arc::clone(&daemon);
        let handle = tokio::spawn(async move { runner.run().await });

        for _ in 0..100 {
            if daemon.connections().indexer().passes_completed() == 1 && sock.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(daemon.connections().indexer().passes_completed(), 1);

        daemon.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!sock.exists());
    }
}
