//! Request/response bodies for daemon IPC, shared by server and client.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::connections::IndexerState;

/// Daemon health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub git_hash: String,
    pub build_profile: String,
}

/// Daemon runtime status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub version: String,
    pub uptime_secs: u64,
    pub pid: u32,
    pub indexer_state: IndexerState,
    pub passes_completed: u64,
    pub pending_continuations: usize,
    pub connections: usize,
    pub libraries: Vec<PathBuf>,
    pub reindex_pending: bool,
    pub session_busy: bool,
}

/// One console line entered in the host session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleInputRequest {
    pub input: String,
}

/// Whether a console line scheduled a re-index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleInputResponse {
    pub scheduled: bool,
}

/// Host report that the foreground session became busy or returned to its
/// prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReadyRequest {
    pub busy: bool,
}

/// Daemon shutdown response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub acknowledged: bool,
    pub message: String,
}

/// Generic error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
