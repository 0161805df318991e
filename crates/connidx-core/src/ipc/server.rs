//! IPC server: axum HTTP router over a Unix domain socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use connidx_config::AppConfig;

use super::types::*;
use crate::connections::ConnectionsModule;
use crate::daemon::ShutdownSignal;
use crate::host::TokioScheduler;

/// Shared state accessible to all IPC route handlers.
pub struct IpcState {
    pub connections: Arc<ConnectionsModule>,
    pub scheduler: Arc<TokioScheduler>,
    pub shutdown_tx: broadcast::Sender<ShutdownSignal>,
    pub started_at: Instant,
}

/// Default Unix socket path for daemon IPC.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/connidx.sock";

/// Build the axum router with all IPC routes.
pub fn router(state: Arc<IpcState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/connections", get(handle_connections))
        .route("/connections/refresh", post(handle_refresh))
        .route("/console", post(handle_console))
        .route("/session/ready", post(handle_session_ready))
        .route("/stop", post(handle_stop))
        .with_state(state)
}

/// Serve IPC on `socket_path` until a shutdown signal arrives.
///
/// A stale socket file left by a previous run is removed before binding, and
/// the socket is removed again on exit.
pub async fn serve(
    socket_path: &Path,
    state: Arc<IpcState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "IPC server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("IPC server shutting down");
        })
        .await?;

    std::fs::remove_file(socket_path).ok();
    Ok(())
}

/// Resolve the socket path from config or use the default.
pub fn socket_path_from_config(config: &AppConfig) -> PathBuf {
    config
        .daemon
        .socket_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::build_info::VERSION.to_string(),
        git_hash: crate::build_info::GIT_HASH.to_string(),
        build_profile: crate::build_info::BUILD_PROFILE.to_string(),
    })
}

async fn handle_status(State(state): State<Arc<IpcState>>) -> Json<StatusResponse> {
    let indexer = state.connections.indexer();

    Json(StatusResponse {
        running: true,
        version: crate::build_info::version_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        pid: std::process::id(),
        indexer_state: indexer.state(),
        passes_completed: indexer.passes_completed(),
        pending_continuations: indexer.pending_continuations(),
        connections: indexer.current().len(),
        libraries: indexer.scanner().libraries().to_vec(),
        reindex_pending: state.connections.trigger().reindex_pending(),
        session_busy: state.scheduler.is_busy(),
    })
}

async fn handle_connections(State(state): State<Arc<IpcState>>) -> Json<serde_json::Value> {
    Json(state.connections.registry_as_json())
}

async fn handle_refresh(State(state): State<Arc<IpcState>>) -> Json<serde_json::Value> {
    debug!("Refresh requested via IPC");
    Json(state.connections.refresh().await)
}

type IpcError = (StatusCode, Json<ErrorResponse>);

/// Turn a rejected JSON body into the error shape clients decode.
fn bad_body(route: &str, rejection: JsonRejection) -> IpcError {
    warn!(route, error = %rejection.body_text(), "Rejected IPC request body");
    (
        rejection.status(),
        Json(ErrorResponse {
            error: format!("{route}: {}", rejection.body_text()),
        }),
    )
}

async fn handle_console(
    State(state): State<Arc<IpcState>>,
    body: Result<Json<ConsoleInputRequest>, JsonRejection>,
) -> Result<Json<ConsoleInputResponse>, IpcError> {
    let Json(req) = body.map_err(|e| bad_body("/console", e))?;
    Ok(Json(ConsoleInputResponse {
        scheduled: state.connections.on_console_input(&req.input),
    }))
}

async fn handle_session_ready(
    State(state): State<Arc<IpcState>>,
    body: Result<Json<SessionReadyRequest>, JsonRejection>,
) -> Result<StatusCode, IpcError> {
    let Json(req) = body.map_err(|e| bad_body("/session/ready", e))?;
    debug!(busy = req.busy, "Session readiness changed");
    state.scheduler.set_busy(req.busy);
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_stop(State(state): State<Arc<IpcState>>) -> (StatusCode, Json<StopResponse>) {
    info!("Stop requested via IPC");
    let _ = state.shutdown_tx.send(ShutdownSignal);
    (
        StatusCode::OK,
        Json(StopResponse {
            acknowledged: true,
            message: "Shutdown initiated".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::IndexerState;
    use crate::host::ConfiguredHost;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state_for(config: &AppConfig) -> Arc<IpcState> {
        let scheduler = Arc::new(TokioScheduler::new());
        let connections = Arc::new(ConnectionsModule::new(
            config,
            Arc::new(ConfiguredHost::from_config(config)),
            scheduler.clone(),
        ));
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        Arc::new(IpcState {
            connections,
            scheduler,
            shutdown_tx,
            started_at: Instant::now(),
        })
    }

    fn test_state() -> Arc<IpcState> {
        state_for(&AppConfig::default())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(test_state());
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let health: HealthResponse = body_json(resp).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, crate::build_info::VERSION);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_idle_indexer() {
        let app = router(test_state());
        let req = Request::get("/status").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let status: StatusResponse = body_json(resp).await;
        assert!(status.running);
        assert_eq!(status.indexer_state, IndexerState::Idle);
        assert_eq!(status.passes_completed, 0);
        assert_eq!(status.connections, 0);
        assert!(!status.session_busy);
    }

    #[tokio::test]
    async fn test_connections_endpoint_serves_current_registry() {
        let app = router(test_state());
        let req = Request::get("/connections").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let registry: serde_json::Value = body_json(resp).await;
        assert_eq!(registry, json!({}));
    }

    #[tokio::test]
    async fn test_refresh_endpoint_waits_for_pass() {
        let lib = TempDir::new().unwrap();
        let dir = lib.path().join("odbc/rstudio");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("connections.dcf"), "Name: pg\n").unwrap();

        let mut config = AppConfig::default();
        config.library.paths = vec![lib.path().to_path_buf()];
        let state = state_for(&config);
        let app = router(state.clone());

        let req = Request::post("/connections/refresh")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let registry: serde_json::Value = body_json(resp).await;
        assert_eq!(registry, json!({"odbc::pg": {"name": "pg", "package": "odbc"}}));
        assert_eq!(state.connections.indexer().passes_completed(), 1);
    }

    #[tokio::test]
    async fn test_console_endpoint_schedules_on_install() {
        let state = test_state();

        let resp = router(state.clone())
            .oneshot(post_json("/console", json!({"input": "install.packages(\"DBI\")"})))
            .await
            .unwrap();
        let reply: ConsoleInputResponse = body_json(resp).await;
        assert!(reply.scheduled);
        assert!(state.connections.trigger().reindex_pending());

        let resp = router(state)
            .oneshot(post_json("/console", json!({"input": "x <- 1"})))
            .await
            .unwrap();
        let reply: ConsoleInputResponse = body_json(resp).await;
        assert!(!reply.scheduled);
    }

    #[tokio::test]
    async fn test_console_endpoint_rejects_malformed_body() {
        let state = test_state();
        let resp = router(state.clone())
            .oneshot(post_json("/console", json!({"line": "install.packages(\"DBI\")"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ErrorResponse = body_json(resp).await;
        assert!(err.error.starts_with("/console: "));
        assert!(!state.connections.trigger().reindex_pending());
    }

    #[tokio::test]
    async fn test_session_ready_without_json_content_type() {
        let req = Request::post("/session/ready")
            .body(Body::from(r#"{"busy": true}"#))
            .unwrap();
        let resp = router(test_state()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err: ErrorResponse = body_json(resp).await;
        assert!(err.error.starts_with("/session/ready: "));
    }

    #[tokio::test]
    async fn test_session_ready_toggles_busy() {
        let state = test_state();

        let resp = router(state.clone())
            .oneshot(post_json("/session/ready", json!({"busy": true})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.scheduler.is_busy());

        router(state.clone())
            .oneshot(post_json("/session/ready", json!({"busy": false})))
            .await
            .unwrap();
        assert!(!state.scheduler.is_busy());
    }

    #[tokio::test]
    async fn test_stop_endpoint() {
        let state = test_state();
        let mut rx = state.shutdown_tx.subscribe();
        let app = router(state);

        let req = Request::post("/stop").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stop: StopResponse = body_json(resp).await;
        assert!(stop.acknowledged);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_socket_path_from_config() {
        let mut config = AppConfig::default();
        assert_eq!(socket_path_from_config(&config), PathBuf::from(DEFAULT_SOCKET_PATH));

        config.daemon.socket_path = Some("/run/user/1000/connidx.sock".to_string());
        assert_eq!(
            socket_path_from_config(&config),
            PathBuf::from("/run/user/1000/connidx.sock")
        );
    }
}
