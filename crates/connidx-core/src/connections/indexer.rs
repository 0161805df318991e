//! The connections indexer: one registry per pass, published atomically.
//!
//! ## Pass lifecycle
//!
//! ```text
//!  Idle ──start──▶ Running ──completed hook──▶ Finalizing ──▶ Idle
//!   ▲                 │  on_work × N                │
//!   │                 ▼                             ▼
//!   │        in-progress registry          swap into `current`,
//!   └──────────────────────────────────── drain continuations FIFO
//! ```
//!
//! Readers load the current registry from an [`ArcSwap`] and never see a
//! half-built one. Requests that arrive while a pass is running only enqueue a
//! continuation; the running pass resolves it. The state flag and the
//! continuation queue share one lock, so a request either lands before the
//! drain (and is served by the finishing pass) or observes `Idle` and starts a
//! new pass.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::registry::ConnectionsRegistry;
use crate::host::SessionHost;
use crate::library::{LibraryIndexer, LibraryScanner};

/// Descriptor location inside a package source tree, used for the package
/// under development.
pub const DEV_RESOURCE_PATH: &str = "inst/rstudio/connections.dcf";

/// Result delivered to a continuation once a pass completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: serde_json::Value,
}

impl RpcResponse {
    pub fn success(result: serde_json::Value) -> Self {
        Self { result }
    }
}

/// Deferred completion callback, resolved with the next published registry.
pub type Continuation = Box<dyn FnOnce(RpcResponse) + Send + 'static>;

/// Indexer pass state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerState {
    Idle,
    Running,
    Finalizing,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexerState::Idle => write!(f, "idle"),
            IndexerState::Running => write!(f, "running"),
            IndexerState::Finalizing => write!(f, "finalizing"),
        }
    }
}

struct PassControl {
    state: IndexerState,
    continuations: VecDeque<Continuation>,
}

/// Builds connection registries from package libraries.
pub struct ConnectionsIndexer {
    current: ArcSwap<ConnectionsRegistry>,
    in_progress: Mutex<Option<ConnectionsRegistry>>,
    control: Mutex<PassControl>,
    passes_completed: AtomicU64,
    scanner: LibraryScanner,
    host: Arc<dyn SessionHost>,
}

impl ConnectionsIndexer {
    /// Create an idle indexer whose current registry is empty.
    pub fn new(scanner: LibraryScanner, host: Arc<dyn SessionHost>) -> Self {
        Self {
            current: ArcSwap::from_pointee(ConnectionsRegistry::new()),
            in_progress: Mutex::new(None),
            control: Mutex::new(PassControl {
                state: IndexerState::Idle,
                continuations: VecDeque::new(),
            }),
            passes_completed: AtomicU64::new(0),
            scanner,
            host,
        }
    }

    /// The most recently published registry.
    ///
    /// The returned snapshot stays valid for as long as it is held, even
    /// after later passes publish newer registries.
    pub fn current(&self) -> Arc<ConnectionsRegistry> {
        self.current.load_full()
    }

    /// The current registry serialized for the wire.
    pub fn registry_as_json(&self) -> serde_json::Value {
        self.current.load().to_json()
    }

    pub fn state(&self) -> IndexerState {
        self.control.lock().state
    }

    /// Whether a pass is in flight.
    pub fn running(&self) -> bool {
        self.state() != IndexerState::Idle
    }

    /// Number of passes that have published a registry.
    pub fn passes_completed(&self) -> u64 {
        self.passes_completed.load(Ordering::Acquire)
    }

    /// Number of continuations waiting on the running pass.
    pub fn pending_continuations(&self) -> usize {
        self.control.lock().continuations.len()
    }

    pub fn scanner(&self) -> &LibraryScanner {
        &self.scanner
    }

    /// Start a pass. No-op returning `false` when one is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        self.index_library_paths(None)
    }

    /// Request a fresh index.
    ///
    /// A supplied continuation is always queued, even when a pass is already
    /// running; it is resolved when that pass completes. Starts a pass only
    /// when none is running. Returns whether a new pass was started.
    ///
    /// Passes run on the blocking pool of the current tokio runtime. Called
    /// outside a runtime, the continuation stays queued for the next pass and
    /// the indexer stays idle.
    pub fn index_library_paths(self: &Arc<Self>, continuation: Option<Continuation>) -> bool {
        let runtime = tokio::runtime::Handle::try_current();
        if !self.enqueue(continuation) {
            return false;
        }
        let runtime = match runtime {
            Ok(runtime) => runtime,
            Err(e) => {
                self.control.lock().state = IndexerState::Idle;
                warn!(error = %e, "No tokio runtime to run the index pass; request left queued");
                return false;
            }
        };

        info!(libraries = self.scanner.libraries().len(), "Starting connections index pass");
        let pass: Arc<dyn LibraryIndexer> = Arc::new(PassGuard {
            indexer: Arc::clone(self),
            generation: self.passes_completed(),
        });
        drop(self.scanner.spawn(&runtime, pass));
        true
    }

    /// Request a fresh index and wait for the resulting registry JSON.
    pub async fn refresh(self: &Arc<Self>) -> serde_json::Value {
        let (tx, rx) = oneshot::channel();
        self.index_library_paths(Some(Box::new(move |response: RpcResponse| {
            let _ = tx.send(response.result);
        })));
        match rx.await {
            Ok(json) => json,
            // Every queued continuation is resolved, so this is unreachable in
            // practice; fall back to whatever is current.
            Err(_) => self.registry_as_json(),
        }
    }

    /// Queue `continuation` and claim the `Idle → Running` transition.
    fn enqueue(&self, continuation: Option<Continuation>) -> bool {
        let mut control = self.control.lock();
        if let Some(continuation) = continuation {
            control.continuations.push_back(continuation);
        }
        if control.state != IndexerState::Idle {
            debug!(
                state = %control.state,
                pending = control.continuations.len(),
                "Index pass already in flight; request coalesced"
            );
            return false;
        }
        control.state = IndexerState::Running;
        true
    }

    /// Index the development package's own descriptor when it is loaded in
    /// place, so it shows up before it is installed into a library.
    fn index_dev_package(&self, registry: &mut ConnectionsRegistry) {
        if !self.host.load_all_active() {
            return;
        }
        let (Some(root), Some(package)) = (self.host.project_root(), self.host.package_name())
        else {
            warn!("Load-all mode is active but no project package is known");
            return;
        };

        let path = root.join(DEV_RESOURCE_PATH);
        if path.exists() {
            let added = registry.add_file(&package, &path);
            debug!(package = %package, added, "Indexed development package descriptor");
        }
    }
}

/// One claimed pass, handed to the scanner.
///
/// Forwards the scan hooks to the indexer. If it is dropped before the pass
/// published (the blocking task was cancelled, or a hook panicked), the
/// indexer returns to `Idle` with its continuations still queued, so the next
/// request starts a fresh pass that resolves them.
struct PassGuard {
    indexer: Arc<ConnectionsIndexer>,
    generation: u64,
}

impl LibraryIndexer for PassGuard {
    fn on_indexing_started(&self) {
        self.indexer.on_indexing_started();
    }

    fn on_work(&self, package: &str, path: &Path) {
        self.indexer.on_work(package, path);
    }

    fn on_indexing_completed(&self) {
        self.indexer.on_indexing_completed();
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        {
            let mut control = self.indexer.control.lock();
            // passes_completed only moves under this lock, at publish time
            if self.indexer.passes_completed() != self.generation
                || control.state == IndexerState::Idle
            {
                return;
            }
            control.state = IndexerState::Idle;
            warn!(
                pending = control.continuations.len(),
                "Index pass ended without publishing; indexer reset to idle"
            );
        }
        self.indexer.in_progress.lock().take();
    }
}

impl LibraryIndexer for ConnectionsIndexer {
    fn on_indexing_started(&self) {
        *self.in_progress.lock() = Some(ConnectionsRegistry::new());
    }

    fn on_work(&self, package: &str, path: &Path) {
        let mut in_progress = self.in_progress.lock();
        let registry = in_progress.get_or_insert_with(ConnectionsRegistry::new);
        registry.add_file(package, path);
    }

    fn on_indexing_completed(&self) {
        self.control.lock().state = IndexerState::Finalizing;

        let mut registry = self.in_progress.lock().take().unwrap_or_default();
        self.index_dev_package(&mut registry);

        let registry = Arc::new(registry);
        let json = registry.to_json();
        let size = registry.len();

        let continuations = {
            let mut control = self.control.lock();
            self.current.store(registry);
            self.passes_completed.fetch_add(1, Ordering::AcqRel);
            control.state = IndexerState::Idle;
            std::mem::take(&mut control.continuations)
        };

        info!(
            connections = size,
            continuations = continuations.len(),
            "Connections registry published"
        );

        for continuation in continuations {
            continuation(RpcResponse::success(json.clone()));
        }
    }
}
