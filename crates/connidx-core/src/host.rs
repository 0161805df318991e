//! Host session seams consumed by the indexer and its triggers.
//!
//! The indexer never reaches into ambient global state. Everything it needs to
//! know about the interactive session (whether the packages feature is
//! disabled, whether a package is loaded in place for development) comes
//! through [`SessionHost`], and deferred work goes through
//! [`DelayedWorkScheduler`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use connidx_config::AppConfig;

/// A unit of deferred work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Read-only view of the interactive session.
pub trait SessionHost: Send + Sync {
    /// Whether package functionality (and with it console triggers) is off.
    fn disable_packages(&self) -> bool;

    /// Whether the active project is loaded in place in development mode.
    fn load_all_active(&self) -> bool;

    /// Root directory of the active project, if any.
    fn project_root(&self) -> Option<PathBuf>;

    /// Package name declared by the active project, if any.
    fn package_name(&self) -> Option<String>;
}

/// Schedules work to run later, optionally only once the session is idle.
pub trait DelayedWorkScheduler: Send + Sync {
    /// Run `work` after `delay`. With `idle_only`, the work additionally
    /// waits until the foreground session has returned to its prompt.
    fn schedule_delayed_work(&self, delay: Duration, work: Work, idle_only: bool);
}

#[derive(Debug, Clone, Default)]
struct ProjectState {
    root: Option<PathBuf>,
    package: Option<String>,
}

/// [`SessionHost`] backed by configuration, with runtime setters for the
/// pieces a live session changes.
#[derive(Debug, Default)]
pub struct ConfiguredHost {
    disable_packages: AtomicBool,
    load_all: AtomicBool,
    project: RwLock<ProjectState>,
}

impl ConfiguredHost {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            disable_packages: AtomicBool::new(config.indexer.disable_packages),
            load_all: AtomicBool::new(config.project.load_all),
            project: RwLock::new(ProjectState {
                root: config.project.root.clone(),
                package: config.project.package.clone(),
            }),
        }
    }

    pub fn set_disable_packages(&self, disabled: bool) {
        self.disable_packages.store(disabled, Ordering::Release);
    }

    pub fn set_load_all(&self, active: bool) {
        self.load_all.store(active, Ordering::Release);
    }

    /// Switch the active project.
    pub fn set_project(&self, root: Option<PathBuf>, package: Option<String>) {
        *self.project.write() = ProjectState { root, package };
    }
}

impl SessionHost for ConfiguredHost {
    fn disable_packages(&self) -> bool {
        self.disable_packages.load(Ordering::Acquire)
    }

    fn load_all_active(&self) -> bool {
        self.load_all.load(Ordering::Acquire)
    }

    fn project_root(&self) -> Option<PathBuf> {
        self.project.read().root.clone()
    }

    fn package_name(&self) -> Option<String> {
        self.project.read().package.clone()
    }
}

/// Tokio-backed [`DelayedWorkScheduler`].
///
/// The session reports whether it is busy through [`set_busy`]; idle-only
/// work waits on that signal after its delay elapses. Scheduling must happen
/// from within a tokio runtime.
///
/// [`set_busy`]: TokioScheduler::set_busy
#[derive(Debug)]
pub struct TokioScheduler {
    busy: watch::Sender<bool>,
}

impl TokioScheduler {
    /// Create a scheduler for a session that starts out idle.
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self { busy }
    }

    /// Record whether the foreground session is busy executing a command.
    pub fn set_busy(&self, busy: bool) {
        self.busy.send_replace(busy);
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayedWorkScheduler for TokioScheduler {
    fn schedule_delayed_work(&self, delay: Duration, work: Work, idle_only: bool) {
        let mut busy_rx = self.busy.subscribe();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if idle_only && busy_rx.wait_for(|busy| !*busy).await.is_err() {
                debug!("Scheduler dropped before session became idle; discarding work");
                return;
            }
            work();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_configured_host_from_config() {
        let mut config = AppConfig::default();
        config.indexer.disable_packages = true;
        config.project.root = Some(PathBuf::from("/src/odbc"));
        config.project.package = Some("odbc".to_string());
        config.project.load_all = true;

        let host = ConfiguredHost::from_config(&config);
        assert!(host.disable_packages());
        assert!(host.load_all_active());
        assert_eq!(host.project_root(), Some(PathBuf::from("/src/odbc")));
        assert_eq!(host.package_name().as_deref(), Some("odbc"));
    }

    #[test]
    fn test_configured_host_setters() {
        let host = ConfiguredHost::default();
        assert!(!host.load_all_active());
        host.set_load_all(true);
        host.set_project(Some(PathBuf::from("/src/pkg")), Some("pkg".to_string()));
        assert!(host.load_all_active());
        assert_eq!(host.package_name().as_deref(), Some("pkg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_work_runs_after_delay() {
        let scheduler = TokioScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        scheduler.schedule_delayed_work(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            false,
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_only_work_waits_for_idle() {
        let scheduler = TokioScheduler::new();
        scheduler.set_busy(true);

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        scheduler.schedule_delayed_work(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            true,
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0, "busy session must block idle-only work");

        scheduler.set_busy(false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
