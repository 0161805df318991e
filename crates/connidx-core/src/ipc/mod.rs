//! Daemon IPC: HTTP/JSON over a Unix domain socket.
//!
//! The host session and the CLI connect as clients to read the registry,
//! request refreshes, forward console input, and stop the daemon.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐         Unix socket        ┌──────────────┐
//! │   CLI    │───────────────────────────▶│  IPC Server  │
//! │   Host   │  HTTP/1.1 + JSON           │  (axum)      │
//! └──────────┘                            └──────┬───────┘
//!                                                │
//!                                         ┌──────▼────────────┐
//!                                         │ ConnectionsModule │
//!                                         └───────────────────┘
//! ```
//!
//! `POST /connections/refresh` is answered through an indexer continuation,
//! so the response arrives only once the pass it joined has published.

pub mod client;
pub mod server;
pub mod types;

pub use client::{IpcClient, IpcClientError};
pub use server::{DEFAULT_SOCKET_PATH, IpcState, router, serve, socket_path_from_config};
pub use types::*;
