//! Persistent checksum cache.
//!
//! The cache remembers, per mirror, the last snapshot known to be good. It is read
//! once when a session starts and written back in full when the session ends.
//! [`PersistentCache`] is a guard: call [`PersistentCache::close`] to save and see
//! the result, otherwise `Drop` saves on the way out and logs any failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::checksum::Snapshot;
use crate::error::{Error, Result};
use crate::repository::Repository;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    repositories: BTreeMap<PathBuf, Snapshot>,
}

#[derive(Debug)]
pub struct PersistentCache {
    path: PathBuf,
    entries: BTreeMap<PathBuf, Snapshot>,
    closed: bool,
}

impl PersistentCache {
    /// Load the cache at `path`. A missing file starts an empty session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => decode(&path, &bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                error!("A sudden issue emerged while loading the cache from '{}'.", path.display());
                return Err(Error::fs(&path, e));
            }
        };
        debug!("loaded {} cache entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, repo: &Repository) -> Option<&Snapshot> {
        self.entries.get(repo.local_path())
    }

    pub fn get_mut(&mut self, repo: &Repository) -> Option<&mut Snapshot> {
        self.entries.get_mut(repo.local_path())
    }

    pub fn contains(&self, repo: &Repository) -> bool {
        self.entries.contains_key(repo.local_path())
    }

    /// Replace the entry for `repo`, returning the previous snapshot.
    pub fn insert(&mut self, repo: &Repository, snapshot: Snapshot) -> Option<Snapshot> {
        self.entries.insert(repo.local_path().to_path_buf(), snapshot)
    }

    /// Merge `snapshot` into the existing entry for `repo` (or create it).
    pub fn update(&mut self, repo: &Repository, snapshot: Snapshot) {
        self.entries
            .entry(repo.local_path().to_path_buf())
            .or_default()
            .extend(snapshot);
    }

    pub fn remove(&mut self, repo: &Repository) -> Option<Snapshot> {
        self.entries.remove(repo.local_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Snapshot)> {
        self.entries.iter().map(|(k, v)| (k.as_path(), v))
    }

    /// Write the whole mapping to disk.
    ///
    /// The data lands in a temporary sibling first and is renamed over the target,
    /// so readers never observe a half-written file.
    pub fn save(&self) -> Result<()> {
        let res = (|| -> io::Result<()> {
            let parent = match self.path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            fs::create_dir_all(parent)?;

            let doc = CacheFile {
                version: FORMAT_VERSION,
                repositories: self.entries.clone(),
            };
            let bytes = serde_json::to_vec(&doc).map_err(io::Error::other)?;

            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            Ok(())
        })();

        res.map_err(|e| {
            error!("An error occurred while saving the cache to '{}'.", self.path.display());
            Error::fs(&self.path, e)
        })?;
        debug!("saved {} cache entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// End the session: save and consume the guard.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.save()
    }

    /// End the session without writing anything, for read-only callers.
    pub fn discard(mut self) {
        self.closed = true;
    }
}

impl Drop for PersistentCache {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.save() {
            error!("cache was not saved: {e}");
        }
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<BTreeMap<PathBuf, Snapshot>> {
    let corrupt = |reason: String| {
        error!("The attempt to read the cache stored at '{}' has failed.", path.display());
        Error::CacheFormat {
            path: path.to_path_buf(),
            reason,
        }
    };

    let doc: CacheFile = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if doc.version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", doc.version)));
    }
    Ok(doc.repositories)
}
