//! Crate entry point for **git-mirrors**.
//!
//! The library keeps local mirror clones of a list of remote repositories and
//! remembers a checksum snapshot of every mirror so that damage between runs is
//! noticed and repaired by cloning again.
//!
//! Layout, leaves first:
//! - [`checksum`]: per-file SHA-256 snapshots of a directory tree
//! - [`cache`]: the persistent snapshot cache
//! - [`git`]: the [`Vcs`] trait with `git` executable and libgit2 backends
//! - [`repository`]: URL ↔ local path identity and existence probes
//! - [`sync`]: the per-repository decision procedure and the session loop
//!
//! Library code only emits `tracing` events; the binary installs the subscriber.

pub mod cache;
pub mod checksum;
mod error;
pub mod fs;
pub mod git;
mod list;
pub mod logging;
pub mod paths;
pub mod repository;
pub mod settings;
pub mod sync;

/// Re-export commonly used types and commands so they can be accessed from `git_mirrors::*`.
pub use cache::PersistentCache;
pub use checksum::{Snapshot, snapshot};
pub use error::{Error, Result};
pub use git::{Backend, GitCommand, Libgit2, Vcs};
pub use list::cmd_list;
pub use paths::{Profile, paths};
pub use repository::Repository;
pub use settings::Settings;
pub use sync::{Outcome, Overrides, Session, Summary, cmd_sync, sync_repository};
