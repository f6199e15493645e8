use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, StellarError};

/// Prefix of every workspace directory name.
const WORKSPACE_PREFIX: &str = "stellar-run-";

/// Scratch directory owned by exactly one execution.
///
/// Callers release it with [`Workspace::remove`]. Dropping the value
/// without that (panic, cancelled future) removes the directory
/// synchronously instead.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    name: String,
    removed: bool,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `scratch_root`.
    pub async fn create(scratch_root: &Path) -> Result<Self> {
        fs::create_dir_all(scratch_root).await.map_err(|e| {
            StellarError::Workspace(format!(
                "Cannot create scratch directory {}: {}",
                scratch_root.display(),
                e
            ))
        })?;

        let name = format!("{}{}", WORKSPACE_PREFIX, uuid::Uuid::new_v4());
        let root = scratch_root.join(&name);

        // create_dir, not create_dir_all: an existing path must never be reused
        fs::create_dir(&root).await.map_err(|e| {
            StellarError::Workspace(format!("Cannot create {}: {}", root.display(), e))
        })?;

        debug!(path = %root.display(), "Workspace created");
        Ok(Self {
            root,
            name,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory name, unique per execution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `contents` to `file_name` inside the workspace, byte for byte.
    pub async fn write_file(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        if !is_plain_file_name(file_name) {
            return Err(StellarError::Workspace(format!(
                "Refusing to write outside the workspace: {}",
                file_name
            )));
        }
        let path = self.root.join(file_name);
        fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Delete the directory tree off the executor's worker threads.
    pub async fn remove(mut self) {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(path = %self.root.display(), "Workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove workspace"),
        }
        self.removed = true;
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(path = %self.root.display(), "Workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove workspace"),
        }
    }
}

/// A single normal path component: no separators, no `..`, not empty.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    )
}
