#![deny(unsafe_code)]

//! connidx core runtime.
//!
//! Discovers connection extensions declared by installed packages, keeps an
//! atomically published registry of them, and serves it to clients over a
//! Unix-socket IPC daemon.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Connection entries, the registry, its indexer, and re-index triggers.
pub mod connections;
/// Daemon process: deferred init, IPC serving, shutdown.
pub mod daemon;
/// Debian Control File parsing.
pub mod dcf;
/// Host session seams and the tokio-backed scheduler.
pub mod host;
/// Unix-socket HTTP/JSON control surface.
pub mod ipc;
/// Package library walking.
pub mod library;

pub use connections::{ConnectionEntry, ConnectionsIndexer, ConnectionsModule, ConnectionsRegistry};
pub use daemon::Daemon;
pub use host::{ConfiguredHost, DelayedWorkScheduler, SessionHost, TokioScheduler};
pub use library::{LibraryIndexer, LibraryScanner};
