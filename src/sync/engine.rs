//! Per-repository decision procedure.
//!
//! [`sync_repository`] looks at three facts: is the remote reachable, what does
//! the cache remember, and what is on disk right now. From these it decides
//! whether to fetch into the existing mirror, throw it away and clone again, or
//! leave it alone. The steps run in a fixed order and each one may change what
//! the next one sees: a corrupt mirror removed in step 2 is cloned again in step 4
//! of the same pass.

use std::fmt;
use tracing::{debug, warn};

use crate::cache::PersistentCache;
use crate::checksum::snapshot;
use crate::error::Result;
use crate::fs::remove_directory;
use crate::git::Vcs;
use crate::repository::Repository;

/// How one pass over a repository ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// Remote unreachable; nothing touched.
    Skipped,
    /// Mirror matched its cached snapshot and was fetched.
    Refreshed,
    /// Mirror no longer matched its snapshot; it was deleted and cloned again.
    Reset,
    /// A directory with no cache record that was not a repository was replaced by a clone.
    Replaced,
    /// No local directory existed; a fresh clone was made.
    Cloned,
    /// A cached mirror directory that is not a repository root; no rule applies to it.
    Unchanged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Skipped => "skipped",
            Outcome::Refreshed => "refreshed",
            Outcome::Reset => "re-cloned after corruption",
            Outcome::Replaced => "replaced stale directory",
            Outcome::Cloned => "cloned",
            Outcome::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Bring the mirror of `repo` up to date and keep `cache` in step with the disk.
///
/// # Errors
/// Any filesystem or git failure is returned as-is; nothing is retried.
pub fn sync_repository(
    repo: &Repository,
    cache: &mut PersistentCache,
    vcs: &dyn Vcs,
) -> Result<Outcome> {
    let local = repo.local_path();

    if !repo.exists_on_remote(vcs) {
        warn!("The remote repository could not be detected for: '{}'.", repo.url());
        return Ok(Outcome::Skipped);
    }

    let mut outcome = None;

    if cache.contains(repo) && repo.exists_locally(vcs) {
        let current = snapshot(local)?;
        if cache.get(repo) == Some(&current) {
            debug!("{} matches its cached snapshot", local.display());
            repo.update_local_copy(vcs)?;
            // The pre-fetch snapshot is what gets recorded.
            cache.update(repo, current);
            outcome = Some(Outcome::Refreshed);
        } else {
            warn!("The '{}' repository is corrupted.", local.display());
            if local.is_dir() {
                remove_directory(local)?;
            }
            outcome = Some(Outcome::Reset);
        }
    }

    if !cache.contains(repo) && local.is_dir() && !repo.exists_locally(vcs) {
        debug!("removing stale directory {}", local.display());
        remove_directory(local)?;
        outcome = Some(Outcome::Replaced);
    }

    if !local.is_dir() {
        repo.create_local_copy(vcs)?;
        // A bare clone has no FETCH_HEAD until the first fetch.
        repo.update_local_copy(vcs)?;
        cache.insert(repo, snapshot(local)?);
        return Ok(outcome.unwrap_or(Outcome::Cloned));
    }

    Ok(outcome.unwrap_or(Outcome::Unchanged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Snapshot;
    use crate::git::fake::FakeVcs;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    const URL: &str = "https://example.com/group/proj.git";

    struct Fixture {
        _td: TempDir,
        storage: std::path::PathBuf,
        cache_path: std::path::PathBuf,
        repo: Repository,
    }

    fn fixture() -> Fixture {
        let td = tempdir().unwrap();
        let storage = td.path().join("storage");
        fs::create_dir_all(&storage).unwrap();
        let cache_path = td.path().join("cache.json");
        let repo = Repository::from_url(URL, &storage);
        Fixture {
            _td: td,
            storage,
            cache_path,
            repo,
        }
    }

    fn run(fx: &Fixture, vcs: &FakeVcs) -> Outcome {
        let mut cache = PersistentCache::open(&fx.cache_path).unwrap();
        let outcome = sync_repository(&fx.repo, &mut cache, vcs).unwrap();
        cache.close().unwrap();
        outcome
    }

    fn cached(fx: &Fixture) -> Option<Snapshot> {
        PersistentCache::open(&fx.cache_path)
            .unwrap()
            .get(&fx.repo)
            .cloned()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn first_run_clones_fetches_and_records() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);

        assert_eq!(run(&fx, &vcs), Outcome::Cloned);

        assert_eq!(entries(&fx.storage), vec!["proj.git"]);
        let snap = cached(&fx).unwrap();
        assert!(!snap.is_empty());
        assert_eq!(snap, snapshot(fx.repo.local_path()).unwrap());
        assert!(snap.contains_key(&fx.repo.local_path().join("FETCH_HEAD")));

        let calls = vcs.calls();
        let clone = calls.iter().position(|c| c.starts_with("clone")).unwrap();
        assert!(calls[clone + 1].starts_with("fetch"));
    }

    #[test]
    fn unreachable_remote_is_skipped_without_side_effects() {
        let fx = fixture();
        let vcs = FakeVcs::default();

        assert_eq!(run(&fx, &vcs), Outcome::Skipped);
        assert!(entries(&fx.storage).is_empty());
        assert!(cached(&fx).is_none());
        assert_eq!(vcs.calls(), vec![format!("ls-remote {URL}")]);
    }

    #[test]
    fn second_run_is_idempotent() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);

        run(&fx, &vcs);
        let first = cached(&fx).unwrap();
        let files = snapshot(fx.repo.local_path()).unwrap();

        assert_eq!(run(&fx, &vcs), Outcome::Refreshed);
        assert_eq!(cached(&fx).unwrap(), first);
        assert_eq!(snapshot(fx.repo.local_path()).unwrap(), files);
        assert_eq!(vcs.calls().iter().filter(|c| c.starts_with("clone")).count(), 1);
    }

    #[test]
    fn corrupted_mirror_is_deleted_and_cloned_again() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        run(&fx, &vcs);

        let local = fx.repo.local_path();
        fs::remove_file(local.join("FETCH_HEAD")).unwrap();
        fs::write(local.join("intruder"), "x").unwrap();

        assert_eq!(run(&fx, &vcs), Outcome::Reset);
        assert!(!local.join("intruder").exists());
        assert!(local.join("FETCH_HEAD").is_file());
        assert_eq!(cached(&fx).unwrap(), snapshot(local).unwrap());
        assert_eq!(vcs.calls().iter().filter(|c| c.starts_with("clone")).count(), 2);
    }

    #[test]
    fn modified_file_counts_as_corruption() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        run(&fx, &vcs);

        let packed = fx.repo.local_path().join("packed-refs");
        let original = fs::read_to_string(&packed).unwrap();
        fs::write(&packed, "tampered").unwrap();

        assert_eq!(run(&fx, &vcs), Outcome::Reset);
        assert_eq!(fs::read_to_string(&packed).unwrap(), original);
        assert_eq!(cached(&fx).unwrap(), snapshot(fx.repo.local_path()).unwrap());
    }

    #[test]
    fn stale_non_repository_directory_is_replaced() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        let local = fx.repo.local_path();
        fs::create_dir_all(local.join("junk")).unwrap();
        fs::write(local.join("junk").join("file"), "x").unwrap();

        assert_eq!(run(&fx, &vcs), Outcome::Replaced);
        assert!(!local.join("junk").exists());
        assert!(local.join("HEAD").is_file());
        assert!(cached(&fx).is_some());
    }

    #[test]
    fn uncached_valid_mirror_is_kept_as_is() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        let local = fx.repo.local_path();
        fs::create_dir_all(local).unwrap();
        fs::write(local.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        assert_eq!(run(&fx, &vcs), Outcome::Unchanged);
        assert!(cached(&fx).is_none());
        assert!(!vcs.calls().iter().any(|c| c.starts_with("clone")));
    }

    #[test]
    fn cached_but_invalid_directory_is_left_alone() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        run(&fx, &vcs);
        fs::remove_file(fx.repo.local_path().join("HEAD")).unwrap();
        let before = cached(&fx);

        assert_eq!(run(&fx, &vcs), Outcome::Unchanged);
        assert!(fx.repo.local_path().is_dir());
        assert_eq!(cached(&fx), before);
    }

    #[test]
    fn cache_entry_without_directory_triggers_clone() {
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        let mut cache = PersistentCache::open(&fx.cache_path).unwrap();
        let mut stale = Snapshot::new();
        stale.insert(fx.repo.local_path().join("old"), "00".into());
        cache.insert(&fx.repo, stale);

        assert_eq!(
            sync_repository(&fx.repo, &mut cache, &vcs).unwrap(),
            Outcome::Cloned
        );
        assert_eq!(
            cache.get(&fx.repo).unwrap(),
            &snapshot(fx.repo.local_path()).unwrap()
        );
    }

    #[test]
    fn fetch_failure_propagates_and_keeps_cache_entry() {
        let fx = fixture();
        run(&fx, &FakeVcs::with_remotes([URL]));
        let before = cached(&fx).unwrap();

        let mut failing = FakeVcs::with_remotes([URL]);
        failing.fail_fetch = true;
        let mut cache = PersistentCache::open(&fx.cache_path).unwrap();
        let err = sync_repository(&fx.repo, &mut cache, &failing).unwrap_err();
        assert!(matches!(err, crate::Error::ExternalProcess { .. }));
        assert_eq!(cache.get(&fx.repo), Some(&before));
    }

    #[cfg(unix)]
    #[test]
    fn corrupted_symlinked_mirror_is_unlinked_not_followed() {
        use std::os::unix::fs as unix_fs;
        let fx = fixture();
        let vcs = FakeVcs::with_remotes([URL]);
        run(&fx, &vcs);

        let local = fx.repo.local_path();
        let moved = fx.storage.join("moved");
        fs::rename(local, &moved).unwrap();
        unix_fs::symlink(&moved, local).unwrap();

        // Through the symlink the snapshot is empty, so it no longer matches.
        assert_eq!(run(&fx, &vcs), Outcome::Reset);
        assert!(moved.join("HEAD").is_file());
        assert!(!fs::symlink_metadata(local).unwrap().file_type().is_symlink());
    }
}
