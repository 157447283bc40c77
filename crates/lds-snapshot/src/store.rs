//! Snapshot storage: trait + file-backed implementation.
//!
//! A store keeps named snapshot strings. It knows nothing about their
//! content; sealing and verification happen in [`crate::Snapshot`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, SnapshotError};

/// Trait for snapshot persistence backends.
pub trait SnapshotStore: Send + Sync {
    /// Replace the snapshot stored under `name`.
    fn save(&self, name: &str, contents: &str) -> Result<()>;

    /// Read the snapshot stored under `name`, if there is one.
    fn load(&self, name: &str) -> Result<Option<String>>;
}

/// File-system backed snapshot store.
///
/// Each snapshot is one file, `{root}/{name}.json`. Writes go to a temporary
/// file in the same directory which is then renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding snapshot `name`.
    pub fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.snapshot_path(name)?;
        let tmp = self.root.join(format!(".{name}.json.tmp"));

        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), bytes = contents.len(), "Snapshot saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<String>> {
        let path = self.snapshot_path(name)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SnapshotError::InvalidName(name.to_string()))
    }
}
