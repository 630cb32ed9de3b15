use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the mirroring library.
///
/// The variants separate "the disk failed" from "the data on disk is bad" from
/// "git failed", because callers treat them differently: probes swallow
/// [`Error::ExternalProcess`], everything else propagates to the entry point.
#[derive(Debug, Error)]
pub enum Error {
    #[error("filesystem operation failed on '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache file '{}' is corrupt: {reason}", path.display())]
    CacheFormat { path: PathBuf, reason: String },

    #[error("invalid settings in '{}': {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("failed to run the command: '{command}' ({reason})")]
    ExternalProcess { command: String, reason: String },

    #[error("interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fs(path: &Path, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit status for this error: `EINTR` for interrupts, `EPERM` otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Interrupted => 4,
            _ => 1,
        }
    }
}
