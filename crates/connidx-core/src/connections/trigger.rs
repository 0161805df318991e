//! Re-index triggers driven by host session events.
//!
//! Console input that mutates the package library (installs, removals,
//! development loads) schedules a delayed, idle-only re-index so the runtime
//! has finished touching the library before the scan observes it. While such
//! a re-index is pending, further matching input does not schedule another.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use super::indexer::ConnectionsIndexer;
use crate::host::{DelayedWorkScheduler, SessionHost};

/// Console command prefixes that mutate the package library.
pub const PACKAGE_MUTATING_COMMANDS: [&str; 6] = [
    "install.packages",
    "remove.packages",
    "devtools::install_github",
    "install_github",
    "devtools::load_all",
    "load_all",
];

/// Whether a console line starts with a package-mutating command.
pub fn is_package_mutating(input: &str) -> bool {
    let trimmed = input.trim();
    PACKAGE_MUTATING_COMMANDS
        .iter()
        .any(|command| trimmed.starts_with(command))
}

/// Turns session events into index requests.
pub struct ConnectionsTrigger {
    indexer: Arc<ConnectionsIndexer>,
    host: Arc<dyn SessionHost>,
    scheduler: Arc<dyn DelayedWorkScheduler>,
    delay: Duration,
    pending: Arc<AtomicBool>,
}

impl ConnectionsTrigger {
    pub fn new(
        indexer: Arc<ConnectionsIndexer>,
        host: Arc<dyn SessionHost>,
        scheduler: Arc<dyn DelayedWorkScheduler>,
        delay: Duration,
    ) -> Self {
        Self {
            indexer,
            host,
            scheduler,
            delay,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deferred host initialization: always re-index.
    pub fn on_deferred_init(&self) {
        info!("Deferred init; indexing package libraries");
        self.indexer.index_library_paths(None);
    }

    /// Inspect one line of console input. Returns whether a re-index was
    /// scheduled by this line.
    pub fn on_console_input(&self, input: &str) -> bool {
        if self.host.disable_packages() {
            return false;
        }
        if !is_package_mutating(input) {
            return false;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("Re-index already pending; console input coalesced");
            return false;
        }

        debug!(delay_ms = self.delay.as_millis() as u64, "Package library mutation detected; scheduling re-index");
        let indexer = Arc::clone(&self.indexer);
        let pending = Arc::clone(&self.pending);
        self.scheduler.schedule_delayed_work(
            self.delay,
            Box::new(move || {
                pending.store(false, Ordering::Release);
                indexer.index_library_paths(None);
            }),
            true,
        );
        true
    }

    /// Whether a console-triggered re-index is waiting to run.
    pub fn reindex_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
