use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::git::Vcs;
use crate::paths::expand_home;

/// One backup target: a remote URL and the local directory that mirrors it.
///
/// Identity is the local path alone. Two URLs that land on the same directory
/// (`https://h/g/proj` and `git@h:g/proj.git`) are the same repository as far as
/// the cache is concerned.
#[derive(Debug, Clone, Eq)]
pub struct Repository {
    url: String,
    local_path: PathBuf,
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.local_path == other.local_path
    }
}

impl Hash for Repository {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.local_path.hash(state);
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.url, self.local_path.display())
    }
}

/// Directory name for `url`: its last path segment, always ending in `.git`.
///
/// Trailing slashes are ignored and `:` counts as a separator, so scp-like
/// addresses such as `git@host:proj` work too.
pub fn repository_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let name = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    if name.ends_with(".git") {
        name.to_string()
    } else {
        format!("{name}.git")
    }
}

impl Repository {
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
        }
    }

    /// Build the identity for `url` stored under `parent`.
    pub fn from_url(url: &str, parent: &Path) -> Self {
        Self::new(url, expand_home(&parent.join(repository_name(url))))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Whether the remote answers a reference listing. Any failure means "no".
    pub fn exists_on_remote(&self, vcs: &dyn Vcs) -> bool {
        match vcs.probe_remote(&self.url) {
            Ok(()) => true,
            Err(e) => {
                debug!("remote probe for {} failed: {e}", self.url);
                false
            }
        }
    }

    /// Whether `local_path` is a directory that is itself a repository root.
    pub fn exists_locally(&self, vcs: &dyn Vcs) -> bool {
        if !self.local_path.is_dir() {
            return false;
        }
        match vcs.probe_repository_root(&self.local_path) {
            Ok(()) => true,
            Err(e) => {
                debug!("{} is not a repository root: {e}", self.local_path.display());
                false
            }
        }
    }

    /// Mirror-clone the remote into `local_path`.
    pub fn create_local_copy(&self, vcs: &dyn Vcs) -> Result<()> {
        vcs.clone_mirror(&self.url, &self.local_path)
    }

    /// Fetch every ref of the existing mirror.
    pub fn update_local_copy(&self, vcs: &dyn Vcs) -> Result<()> {
        vcs.fetch_all(&self.local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeVcs;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    const URL: &str = "https://example.com/group/proj";

    #[test]
    fn name_enforces_git_suffix() {
        assert_eq!(repository_name("https://example.com/group/proj"), "proj.git");
        assert_eq!(repository_name("https://example.com/group/proj.git"), "proj.git");
        assert_eq!(repository_name("https://example.com/group/proj/"), "proj.git");
        assert_eq!(repository_name("git@example.com:group/proj.git"), "proj.git");
        assert_eq!(repository_name("git@example.com:proj"), "proj.git");
        assert_eq!(repository_name("/srv/git/proj"), "proj.git");
    }

    #[test]
    fn from_url_joins_parent() {
        let repo = Repository::from_url(URL, Path::new("/backups"));
        assert_eq!(repo.local_path(), Path::new("/backups/proj.git"));
        assert_eq!(repo.url(), URL);
        assert_eq!(repo.to_string(), format!("{URL} -> /backups/proj.git"));
    }

    #[test]
    fn equality_and_hash_follow_local_path() {
        let parent = Path::new("/backups");
        let a = Repository::from_url(URL, parent);
        let b = Repository::from_url("git@example.com:group/proj.git", parent);
        let c = Repository::from_url(URL, Path::new("/elsewhere"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn exists_on_remote_swallows_probe_failure() {
        let td = tempdir().unwrap();
        let vcs = FakeVcs::with_remotes([URL]);
        assert!(Repository::from_url(URL, td.path()).exists_on_remote(&vcs));
        assert!(
            !Repository::from_url("https://example.com/missing", td.path())
                .exists_on_remote(&vcs)
        );
    }

    #[test]
    fn exists_locally_requires_directory_then_probe() {
        let td = tempdir().unwrap();
        let vcs = FakeVcs::default();
        let repo = Repository::from_url(URL, td.path());

        assert!(!repo.exists_locally(&vcs));
        assert!(vcs.calls().is_empty(), "no probe without a directory");

        fs::create_dir_all(repo.local_path()).unwrap();
        assert!(!repo.exists_locally(&vcs));

        fs::write(repo.local_path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        assert!(repo.exists_locally(&vcs));
    }

    #[test]
    fn transfers_propagate_failures() {
        let td = tempdir().unwrap();
        let vcs = FakeVcs::with_remotes([URL]);
        let repo = Repository::from_url(URL, td.path());

        assert!(repo.update_local_copy(&vcs).is_err());
        repo.create_local_copy(&vcs).unwrap();
        repo.update_local_copy(&vcs).unwrap();
        assert!(repo.local_path().join("FETCH_HEAD").is_file());
        assert!(repo.create_local_copy(&vcs).is_err());
    }
}
