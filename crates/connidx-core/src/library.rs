//! Package library scanning.
//!
//! A library is a directory whose immediate subdirectories are installed
//! packages. [`LibraryScanner`] walks one or more libraries looking for a
//! resource file at a fixed path inside each package and reports every hit to
//! a [`LibraryIndexer`]. The walk itself is blocking file-system I/O, so
//! [`LibraryScanner::spawn`] runs it on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle hooks invoked by [`LibraryScanner`] during one walk.
///
/// Hooks for a single walk are called sequentially from one worker:
/// `on_indexing_started`, then `on_work` once per discovered resource file,
/// then `on_indexing_completed` exactly once.
pub trait LibraryIndexer: Send + Sync + 'static {
    fn on_indexing_started(&self);

    fn on_work(&self, package: &str, path: &Path);

    fn on_indexing_completed(&self);
}

/// Summary of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Package directories visited.
    pub packages: usize,
    /// Resource files reported to the indexer.
    pub matches: usize,
    /// Packages left unvisited because the deadline passed.
    pub skipped: usize,
    /// Libraries never listed because the deadline had already passed.
    pub libraries_skipped: usize,
}

/// Walks package libraries and drives a [`LibraryIndexer`].
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    libraries: Vec<PathBuf>,
    resource_path: PathBuf,
    deadline: Option<Duration>,
}

impl LibraryScanner {
    /// Create a scanner for `libraries`, looking for `resource_path` inside
    /// each package directory.
    pub fn new(libraries: Vec<PathBuf>, resource_path: impl Into<PathBuf>) -> Self {
        Self {
            libraries,
            resource_path: resource_path.into(),
            deadline: None,
        }
    }

    /// Stop visiting packages once a walk has run for `deadline`. Completion
    /// is still reported so pending callers are released.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn libraries(&self) -> &[PathBuf] {
        &self.libraries
    }

    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    /// Run one walk on `runtime`'s blocking pool.
    ///
    /// `indexer` is dropped when the walk ends, including when the task is
    /// cancelled before it starts or a hook panics.
    pub fn spawn(&self, runtime: &Handle, indexer: Arc<dyn LibraryIndexer>) -> JoinHandle<ScanStats> {
        let scanner = self.clone();
        runtime.spawn_blocking(move || scanner.scan(indexer.as_ref()))
    }

    fn past_deadline(&self, started: Instant) -> bool {
        self.deadline
            .is_some_and(|deadline| started.elapsed() >= deadline)
    }

    /// Run one walk on the current thread.
    pub fn scan(&self, indexer: &dyn LibraryIndexer) -> ScanStats {
        let started = Instant::now();
        let mut stats = ScanStats::default();

        indexer.on_indexing_started();

        'libraries: for (lib_index, library) in self.libraries.iter().enumerate() {
            if self.past_deadline(started) {
                stats.libraries_skipped += self.libraries.len() - lib_index;
                break;
            }

            let packages = match list_packages(library) {
                Ok(packages) => packages,
                Err(e) => {
                    warn!(library = %library.display(), error = %e, "Skipping unreadable package library");
                    continue;
                }
            };

            for (index, (package, dir)) in packages.iter().enumerate() {
                if self.past_deadline(started) {
                    stats.skipped += packages.len() - index;
                    stats.libraries_skipped += self.libraries.len() - lib_index - 1;
                    break 'libraries;
                }

                stats.packages += 1;
                let candidate = dir.join(&self.resource_path);
                if candidate.is_file() {
                    debug!(package, path = %candidate.display(), "Found resource file");
                    stats.matches += 1;
                    indexer.on_work(package, &candidate);
                }
            }
        }

        if stats.skipped > 0 || stats.libraries_skipped > 0 {
            warn!(
                skipped = stats.skipped,
                libraries_skipped = stats.libraries_skipped,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Library scan hit its deadline; remaining packages were not visited"
            );
        }

        indexer.on_indexing_completed();

        info!(
            packages = stats.packages,
            matches = stats.matches,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Library scan complete"
        );
        stats
    }
}

/// List the package directories of one library, sorted by name.
fn list_packages(library: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut packages = Vec::new();
    for entry in std::fs::read_dir(library)? {
        if let Some(package) = package_entry(library, entry) {
            packages.push(package);
        }
    }
    packages.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(packages)
}

/// Classify one directory entry of a library. An unreadable entry is logged
/// and skipped; the rest of the library is still scanned.
fn package_entry(
    library: &Path,
    entry: std::io::Result<std::fs::DirEntry>,
) -> Option<(String, PathBuf)> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
            warn!(library = %library.display(), error = %e, "Skipping unreadable library entry");
            return None;
        }
    };
    let path = entry.path();

    let name = path.file_name().and_then(|n| n.to_str())?;
    // Skip hidden directories and in-progress installs (00LOCK-*)
    if name.starts_with('.') || name.starts_with("00LOCK") {
        return None;
    }
    path.is_dir().then(|| (name.to_string(), path.clone()))
}
