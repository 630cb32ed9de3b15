//! Content fingerprints for mirror directories.
//!
//! A [`Snapshot`] maps every regular file under a root to the hex SHA-256 of its
//! bytes. Two snapshots of the same unchanged tree are always equal, which is what
//! the sync engine relies on to tell a healthy mirror from a damaged one.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::error;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Read size used while hashing. Only affects memory use, never the digest.
pub const CHUNK_SIZE: usize = 8192;

/// File path → lowercase hex SHA-256 digest.
pub type Snapshot = BTreeMap<PathBuf, String>;

/// Hash a single file by streaming it in [`CHUNK_SIZE`] pieces.
pub fn sha256_file(path: &Path) -> Result<String> {
    let digest = (|| -> io::Result<String> {
        let mut f = fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })();

    digest.map_err(|e| {
        error!("It is impossible to calculate the checksum for '{}'.", path.display());
        Error::fs(path, e)
    })
}

/// Fingerprint every regular file below `root`.
///
/// Directories, symlinks and special files are skipped. A `root` that is itself a
/// symlink produces an empty snapshot. Any unreadable file aborts the whole walk.
pub fn snapshot(root: &Path) -> Result<Snapshot> {
    let mut out = Snapshot::new();

    let meta = fs::symlink_metadata(root).map_err(|e| Error::fs(root, e))?;
    if meta.file_type().is_symlink() {
        return Ok(out);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
            Error::fs(&path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let digest = sha256_file(entry.path())?;
        out.insert(entry.into_path(), digest);
    }

    Ok(out)
}
