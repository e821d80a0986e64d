//! Per-task scratch directory.
//!
//! Inputs are fetched into and outputs rendered inside a [`Workspace`]; the
//! finished output is then moved to its final location. Everything left
//! behind is removed when the workspace is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use mf_core::{Error, Result};

pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("mediaforge-")
            .tempdir()
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;
        Ok(Self { temp_dir })
    }

    /// Create the workspace under `parent` instead of the system temp dir.
    pub fn new_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let temp_dir = tempfile::Builder::new()
            .prefix("mediaforge-")
            .tempdir_in(parent)
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Output path `<stem><suffix>` inside the workspace.
    pub fn output(&self, stem: &str, suffix: &str) -> PathBuf {
        self.temp_file(&format!("{stem}{suffix}"))
    }

    /// Move a produced file out of the workspace to `dest`.
    ///
    /// # Errors
    ///
    /// Fails if `produced` does not exist or cannot be moved.
    pub fn finalize(&self, produced: &Path, dest: &Path) -> Result<PathBuf> {
        if !produced.exists() {
            return Err(Error::tool(
                "workspace",
                format!("output file does not exist: {}", produced.display()),
            ));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Rename within a filesystem, copy across filesystems.
        if std::fs::rename(produced, dest).is_err() {
            std::fs::copy(produced, dest).map_err(|e| {
                Error::tool("workspace", format!("failed to copy output to destination: {e}"))
            })?;
            let _ = std::fs::remove_file(produced);
        }

        Ok(dest.to_path_buf())
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("path", &self.path()).finish()
    }
}
