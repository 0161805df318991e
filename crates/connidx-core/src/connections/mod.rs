//! Connection extension registry and the machinery that keeps it current.
//!
//! [`ConnectionsModule`] is the one object a session owns: it wires a
//! [`ConnectionsIndexer`] over the configured package libraries and a
//! [`ConnectionsTrigger`] that turns session events into re-index requests.

pub mod entry;
pub mod indexer;
pub mod registry;
pub mod trigger;

use std::sync::Arc;

use connidx_config::AppConfig;

use crate::host::{DelayedWorkScheduler, SessionHost};
use crate::library::LibraryScanner;

pub use entry::{ConnectionEntry, registry_key};
pub use indexer::{
    Continuation, ConnectionsIndexer, DEV_RESOURCE_PATH, IndexerState, RpcResponse,
};
pub use registry::ConnectionsRegistry;
pub use trigger::{ConnectionsTrigger, PACKAGE_MUTATING_COMMANDS, is_package_mutating};

/// Explicitly owned connections subsystem for one session.
pub struct ConnectionsModule {
    indexer: Arc<ConnectionsIndexer>,
    trigger: ConnectionsTrigger,
}

impl ConnectionsModule {
    /// Build the subsystem from configuration. No pass starts until
    /// [`on_deferred_init`](Self::on_deferred_init) or an explicit request.
    pub fn new(
        config: &AppConfig,
        host: Arc<dyn SessionHost>,
        scheduler: Arc<dyn DelayedWorkScheduler>,
    ) -> Self {
        let scanner = LibraryScanner::new(
            config.library.paths.clone(),
            config.library.resource_path.clone(),
        )
        .with_deadline(config.indexer.scan_timeout());

        let indexer = Arc::new(ConnectionsIndexer::new(scanner, Arc::clone(&host)));
        let trigger = ConnectionsTrigger::new(
            Arc::clone(&indexer),
            host,
            scheduler,
            config.indexer.reindex_delay(),
        );

        Self { indexer, trigger }
    }

    /// The most recently published registry.
    pub fn registry(&self) -> Arc<ConnectionsRegistry> {
        self.indexer.current()
    }

    pub fn registry_as_json(&self) -> serde_json::Value {
        self.indexer.registry_as_json()
    }

    /// Request a fresh index; see [`ConnectionsIndexer::index_library_paths`].
    pub fn index_library_paths(&self, continuation: Option<Continuation>) -> bool {
        self.indexer.index_library_paths(continuation)
    }

    /// Request a fresh index and wait for its registry JSON.
    pub async fn refresh(&self) -> serde_json::Value {
        self.indexer.refresh().await
    }

    pub fn on_deferred_init(&self) {
        self.trigger.on_deferred_init();
    }

    pub fn on_console_input(&self, input: &str) -> bool {
        self.trigger.on_console_input(input)
    }

    pub fn indexer(&self) -> &Arc<ConnectionsIndexer> {
        &self.indexer
    }

    pub fn trigger(&self) -> &ConnectionsTrigger {
        &self.trigger
    }
}
