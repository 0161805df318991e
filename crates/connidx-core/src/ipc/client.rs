//! IPC client: typed access to a running daemon over its Unix socket.
//!
//! Speaks HTTP/1.1 with `hyper` directly on a `UnixStream`; one connection
//! per request.

use std::path::PathBuf;

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::debug;

use super::types::*;

/// Errors from the IPC client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon returned error: {0}")]
    DaemonError(String),
}

/// Client for a running connidx daemon.
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a new IPC client targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send one request and return the response body. A rejected request
    /// body comes back as [`IpcClientError::DaemonError`] carrying the
    /// daemon's [`ErrorResponse`] message.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Bytes, IpcClientError> {
        if !self.daemon_available() {
            return Err(IpcClientError::NotRunning(self.socket_path.clone()));
        }

        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| IpcClientError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                })?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, http_body_util::Full<Bytes>>(io)
                .await
                .map_err(|e| IpcClientError::Request(format!("HTTP handshake failed: {e}")))?;

        // Drive the connection in the background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "IPC connection error");
            }
        });

        debug!(method, path, "IPC request");

        let http_method = method
            .parse::<hyper::Method>()
            .map_err(|e| IpcClientError::Request(format!("invalid method: {e}")))?;

        let req_body = if let Some(data) = body {
            http_body_util::Full::new(Bytes::copy_from_slice(data))
        } else {
            http_body_util::Full::new(Bytes::new())
        };

        let mut builder = hyper::Request::builder()
            .method(http_method)
            .uri(path)
            .header("host", "localhost");

        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }

        let req = builder
            .body(req_body)
            .map_err(|e| IpcClientError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IpcClientError::Request(format!("request failed: {e}")))?;

        let status = resp.status();

        let resp_body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| IpcClientError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&resp_body) {
                return Err(IpcClientError::DaemonError(err.error));
            }
            return Err(IpcClientError::Request(format!(
                "unexpected status: {status}"
            )));
        }

        Ok(resp_body)
    }

    // ── Typed API methods ──────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse, IpcClientError> {
        let body = self.request("GET", "/health", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("health: {e}")))
    }

    pub async fn status(&self) -> Result<StatusResponse, IpcClientError> {
        let body = self.request("GET", "/status", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("status: {e}")))
    }

    /// The registry the daemon currently serves, without waiting for a pass.
    pub async fn connections(&self) -> Result<serde_json::Value, IpcClientError> {
        let body = self.request("GET", "/connections", None).await?;
        serde_json::from_slice(&body)
            .map_err(|e| IpcClientError::Parse(format!("connections: {e}")))
    }

    /// Ask for a fresh index and wait until the daemon has published it.
    pub async fn refresh(&self) -> Result<serde_json::Value, IpcClientError> {
        let body = self.request("POST", "/connections/refresh", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("refresh: {e}")))
    }

    /// Forward one console line to the daemon's trigger layer.
    pub async fn console_input(&self, input: &str) -> Result<ConsoleInputResponse, IpcClientError> {
        let req = ConsoleInputRequest {
            input: input.to_string(),
        };
        let body_bytes = serde_json::to_vec(&req)
            .map_err(|e| IpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        let body = self.request("POST", "/console", Some(&body_bytes)).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("console: {e}")))
    }

    /// Report whether the foreground session is busy.
    pub async fn session_ready(&self, busy: bool) -> Result<(), IpcClientError> {
        let body_bytes = serde_json::to_vec(&SessionReadyRequest { busy })
            .map_err(|e| IpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        self.request("POST", "/session/ready", Some(&body_bytes))
            .await?;
        Ok(())
    }

    /// Request daemon shutdown.
    pub async fn stop(&self) -> Result<StopResponse, IpcClientError> {
        let body = self.request("POST", "/stop", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("stop: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_without_socket_is_unavailable() {
        let client = IpcClient::new("/tmp/test-connidx-missing.sock");
        assert!(!client.daemon_available());
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        let client = IpcClient::new("/tmp/nonexistent-connidx.sock");
        let result = client.connections().await;
        assert!(matches!(result, Err(IpcClientError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_integration_server_client() {
        use std::sync::Arc;
        use std::time::Instant;
        use tempfile::TempDir;
        use tokio::sync::broadcast;

        use super::super::server;
        use crate::connections::ConnectionsModule;
        use crate::host::{ConfiguredHost, TokioScheduler};

        let lib = TempDir::new().unwrap();
        let dir = lib.path().join("odbc/rstudio");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("connections.dcf"), "Name: pg\n\nName: sqlite\n").unwrap();

        let mut config = connidx_config::AppConfig::default();
        config.library.paths = vec![lib.path().to_path_buf()];

        let scheduler = Arc::new(TokioScheduler::new());
        let connections = Arc::new(ConnectionsModule::new(
            &config,
            Arc::new(ConfiguredHost::from_config(&config)),
            scheduler.clone(),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(server::IpcState {
            connections,
            scheduler: scheduler.clone(),
            shutdown_tx: shutdown_tx.clone(),
            started_at: Instant::now(),
        });

        let sock_path =
            std::env::temp_dir().join(format!("connidx-test-ipc-{}.sock", std::process::id()));
        std::fs::remove_file(&sock_path).ok();

        let sock_path_clone = sock_path.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let server_handle = tokio::spawn(async move {
            server::serve(&sock_path_clone, state, shutdown_rx)
                .await
                .unwrap();
        });

        // Give server time to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let client = IpcClient::new(&sock_path);
        assert!(client.daemon_available());

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");

        assert_eq!(client.connections().await.unwrap(), serde_json::json!({}));

        let refreshed = client.refresh().await.unwrap();
        assert_eq!(refreshed.as_object().map(|m| m.len()), Some(2));
        assert_eq!(client.connections().await.unwrap(), refreshed);

        let status = client.status().await.unwrap();
        assert_eq!(status.passes_completed, 1);
        assert_eq!(status.connections, 2);

        client.session_ready(true).await.unwrap();
        assert!(scheduler.is_busy());

        let reply = client.console_input("remove.packages(\"odbc\")").await.unwrap();
        assert!(reply.scheduled);

        let rejected = client
            .request("POST", "/console", Some(&br#"{"busy": false}"#[..]))
            .await;
        match rejected {
            Err(IpcClientError::DaemonError(message)) => {
                assert!(message.starts_with("/console: "), "{message}");
            }
            other => panic!("expected daemon error, got {other:?}"),
        }

        let stop = client.stop().await.unwrap();
        assert!(stop.acknowledged);

        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), server_handle).await;
        std::fs::remove_file(&sock_path).ok();
    }
}
