//! Git integration layer.
//!
//! Everything the sync engine needs from git goes through the [`Vcs`] trait: two
//! transfers (mirror clone, fetch-all) and two probes (is this a repository root,
//! is this remote reachable). The rest of the crate never talks to a backend
//! directly, so the external `git` executable and libgit2 are interchangeable.

mod command;
#[cfg(test)]
pub(crate) mod fake;
mod git2_backend;

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

pub use command::GitCommand;
pub use git2_backend::Libgit2;

/// The four git primitives the sync engine depends on.
///
/// Every method reports failure as [`crate::Error::ExternalProcess`]. The probes
/// return `Err` for "no"; turning that into a boolean is the caller's call.
pub trait Vcs {
    /// Full mirror clone of `url` into `dest`: no working tree, no hard links.
    fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()>;

    /// Refresh every ref of the existing mirror at `repo`.
    fn fetch_all(&self, repo: &Path) -> Result<()>;

    /// Succeeds iff `path` is itself the root of a git repository.
    fn probe_repository_root(&self, path: &Path) -> Result<()>;

    /// Succeeds iff `url` answers a reference listing.
    fn probe_remote(&self, url: &str) -> Result<()>;
}

/// Which [`Vcs`] implementation to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Git,
    Libgit2,
}

impl Backend {
    pub fn build(self) -> Box<dyn Vcs> {
        match self {
            Backend::Git => Box::new(GitCommand::default()),
            Backend::Libgit2 => Box::new(Libgit2),
        }
    }
}
