use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sandbox::workspace::is_plain_file_name;

/// A file the caller attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Identifier the upload store resolves
    pub id: String,
    /// Original file name, used inside the workspace
    pub name: String,
    /// Text content, used for prompt construction
    pub content: String,
}

/// Resolves uploaded-file identifiers to stored bytes.
pub trait UploadStore: Send + Sync {
    /// `None` when the id is unknown or unreadable
    fn resolve(&self, id: &str) -> Option<Vec<u8>>;
}

/// Upload store backed by a flat directory: id `x` lives at `root/x`.
#[derive(Debug, Clone)]
pub struct DirectoryUploadStore {
    root: PathBuf,
}

impl DirectoryUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl UploadStore for DirectoryUploadStore {
    fn resolve(&self, id: &str) -> Option<Vec<u8>> {
        if !is_plain_file_name(id) {
            debug!(id = %id, "Upload id is not a plain file name");
            return None;
        }
        std::fs::read(self.root.join(id)).ok()
    }
}
