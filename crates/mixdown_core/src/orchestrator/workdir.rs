//! Scoped working directory.
//!
//! The orchestrator acquires the temporary working directory exactly once
//! per run and releases it through `Drop`, so cleanup happens on every
//! exit path: success, step failure, external-tool timeout, or panic.
//! Only the orchestrator creates or removes entries here; each step
//! writes to uniquely named paths it owns.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// RAII guard over a run's working directory.
pub struct WorkDir {
    path: PathBuf,
    cleanup: bool,
}

impl WorkDir {
    /// Create `<root>/<run_name>` and guard it.
    ///
    /// `cleanup` controls whether the directory is deleted on drop.
    pub fn create(root: &Path, run_name: &str, cleanup: bool) -> io::Result<Self> {
        let path = root.join(run_name);
        fs::create_dir_all(&path)?;
        Ok(Self { path, cleanup })
    }

    /// The guarded directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the directory in place on drop.
    pub fn keep(&mut self) {
        self.cleanup = false;
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.cleanup {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to clean up working directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
