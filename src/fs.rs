use std::fs;
use std::path::Path;

use tracing::error;

use crate::error::{Error, Result};

/// Create `path` and any missing parents. Existing directories are fine.
pub fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        error!("It is not possible to create a new directory at '{}'.", path.display());
        Error::fs(path, e)
    })
}

/// Remove a directory tree.
///
/// A symlink is unlinked as a single entry; its target is left alone.
pub fn remove_directory(path: &Path) -> Result<()> {
    let is_symlink = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);

    let res = if is_symlink {
        fs::remove_file(path)
    } else {
        fs::remove_dir_all(path)
    };

    res.map_err(|e| {
        error!("It is impossible to remove the directory '{}'.", path.display());
        Error::fs(path, e)
    })
}
