//! Scoped temporary directory for one top-level input.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the folder all run directories live under.
const TEMP_FOLDER: &str = "discmux_tmp";

/// Freshly named directory for intermediate files.
///
/// Every run gets its own directory so concurrent runs cannot collide. The
/// directory and everything in it is removed when the workspace is dropped,
/// on success and error paths alike.
///
/// # Example
///
/// ```no_run
/// use discmux_av::Workspace;
///
/// let workspace = Workspace::new(None)?;
/// let chapters = workspace.file("00800.txt");
/// assert!(chapters.starts_with(workspace.path()));
/// # Ok::<(), discmux_av::Error>(())
/// ```
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a run directory under `root`, or the system temp dir.
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let parent = root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
            .join(TEMP_FOLDER);
        std::fs::create_dir_all(&parent).map_err(|e| Error::workspace(&parent, e))?;

        let dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&parent)
            .map_err(|e| Error::workspace(&parent, e))?;
        tracing::debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    /// Get the workspace directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::new(Some(root.path())).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.file("a.flac"), b"x").unwrap();
        assert!(path.starts_with(root.path().join(TEMP_FOLDER)));

        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_workspaces_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::new(Some(root.path())).unwrap();
        let b = Workspace::new(Some(root.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
