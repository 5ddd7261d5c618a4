//! Transient build directory
//!
//! Generated sources and intermediate objects live here. The directory is
//! removed when the guard drops, on every exit path including unwinding,
//! unless ownership is explicitly taken with [`BuildDirectory::keep`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct BuildDirectory {
    path: PathBuf,
    keep: bool,
}

/// Marker written into every directory created by [`BuildDirectory::create`]
pub const BUILD_STAMP: &str = ".redline-build-stamp";

impl BuildDirectory {
    /// Create a fresh, empty directory at `path`.
    ///
    /// A leftover from an earlier run is removed first. Existing directories
    /// that are neither empty nor stamped are refused with `AlreadyExists`.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if path.exists() {
            if !Self::is_reusable(&path) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} contains files not created by redline", path.display()),
                ));
            }
            debug!(path = %path.display(), "clearing stale build directory");
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        fs::write(path.join(BUILD_STAMP), "")?;
        Ok(Self { path, keep: false })
    }

    /// Whether `path` may be cleared: missing, empty, or stamped by an earlier run
    pub fn is_reusable(path: &Path) -> bool {
        if !path.exists() {
            return true;
        }
        if path.join(BUILD_STAMP).is_file() {
            return true;
        }
        match fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm cleanup and hand the directory to the caller
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BuildDirectory {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed build directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove build directory"),
        }
    }
}
