//! On-disk package library fixtures.
//!
//! [`TestLibrary`] owns a temporary directory laid out like an installed
//! package library, so scanner and indexer tests can install packages with
//! descriptor files and remove them again between passes.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Descriptor location inside an installed package.
pub const RESOURCE_PATH: &str = "rstudio/connections.dcf";

/// A temporary package library, deleted on drop.
pub struct TestLibrary {
    dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp library"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Install `package` with `descriptor` as its connections file.
    pub fn install(&self, package: &str, descriptor: &str) -> PathBuf {
        let path = self.dir.path().join(package).join(RESOURCE_PATH);
        write_file(&path, descriptor);
        path
    }

    /// Install `package` without any connections file.
    pub fn install_plain(&self, package: &str) {
        std::fs::create_dir_all(self.dir.path().join(package))
            .expect("failed to create package directory");
    }

    /// Remove `package` entirely.
    pub fn remove(&self, package: &str) {
        std::fs::remove_dir_all(self.dir.path().join(package))
            .expect("failed to remove package directory");
    }
}

impl Default for TestLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary package source tree with a development descriptor under
/// `inst/`, as seen before the package is installed.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new(descriptor: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp project");
        write_file(
            &dir.path().join(connidx_core::connections::DEV_RESOURCE_PATH),
            descriptor,
        );
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create descriptor directory");
    }
    std::fs::write(path, contents).expect("failed to write descriptor");
}
