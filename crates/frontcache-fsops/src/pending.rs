//! Restart markers that outlive a failed run.
//!
//! A marker is written before the change that makes a restart necessary and
//! removed only once the restart succeeds. A later run that finds a marker
//! restarts the service even when every file is already up to date.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};

const MARKER_PREFIX: &str = ".restart-pending.";

/// Marker files kept under one directory, one per service label.
#[derive(Debug, Clone)]
pub struct PendingRestarts {
    dir: PathBuf,
}

impl PendingRestarts {
    /// Markers stored directly under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the marker for `service`.
    #[must_use]
    pub fn marker(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{MARKER_PREFIX}{service}"))
    }

    /// Whether a restart of `service` is still owed. A missing directory
    /// owes nothing.
    #[must_use]
    pub fn is_pending(&self, service: &str) -> bool {
        let pending = self.marker(service).is_file();
        if pending {
            warn!(service, "restart left pending by an earlier run");
        }
        pending
    }

    /// Record that `service` must be restarted.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the marker cannot be written.
    pub fn mark(&self, service: &str) -> FsOpsResult<()> {
        let path = self.marker(service);
        fs::create_dir_all(&self.dir)
            .map_err(|source| FsOpsError::io("pending.create_dir", &self.dir, source))?;
        fs::write(&path, b"")
            .map_err(|source| FsOpsError::io("pending.mark", &path, source))?;
        debug!(service, path = %path.display(), "restart marked pending");
        Ok(())
    }

    /// Forget the marker for `service` after a successful restart.
    ///
    /// # Errors
    ///
    /// Returns an IO error if an existing marker cannot be removed.
    pub fn clear(&self, service: &str) -> FsOpsResult<()> {
        remove_marker(&self.marker(service))
    }
}

fn remove_marker(path: &Path) -> FsOpsResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FsOpsError::io("pending.clear", path, source)),
    }
}
