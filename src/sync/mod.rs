mod engine;
mod progress;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::PersistentCache;
use crate::error::Error;
use crate::fs::create_directory;
use crate::git::Vcs;
use crate::paths::{Profile, paths};
use crate::repository::Repository;
use crate::settings::Settings;

pub use engine::{Outcome, sync_repository};
use progress::{err_style, ok_style, skip_style, spinner_style};

/// Per-outcome tally of one session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    counts: BTreeMap<Outcome, usize>,
}

impl Summary {
    pub fn record(&mut self, outcome: Outcome) {
        *self.counts.entry(outcome).or_default() += 1;
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("nothing to do");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(outcome, n)| format!("{n} {outcome}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Shared collaborators for one sync session.
pub struct Session<'a> {
    pub vcs: &'a dyn Vcs,
    pub progress: &'a MultiProgress,
    /// Set asynchronously by the signal handler.
    pub interrupted: &'a AtomicBool,
}

impl Session<'_> {
    fn check_interrupt(&self) -> crate::Result<()> {
        if self.interrupted.load(Ordering::Relaxed) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Mirror every URL in `repositories` under `storage`.
    ///
    /// The cache at `cache_path` is opened once and shared by every repository.
    /// It is saved whether the loop finishes or fails; a failure inside the loop
    /// takes precedence over a failure to save.
    pub fn sync_all(
        &self,
        storage: &Path,
        repositories: &[String],
        cache_path: &Path,
    ) -> crate::Result<Summary> {
        if !storage.is_dir() {
            create_directory(storage)?;
        }

        let mut cache = PersistentCache::open(cache_path)?;
        let res = self.sync_each(storage, repositories, &mut cache);
        let saved = cache.close();
        let summary = res?;
        saved?;

        info!("Finished: {summary}.");
        Ok(summary)
    }

    fn sync_each(
        &self,
        storage: &Path,
        repositories: &[String],
        cache: &mut PersistentCache,
    ) -> crate::Result<Summary> {
        let mut summary = Summary::default();
        let mut claimed: HashMap<Repository, &str> = HashMap::new();

        for url in repositories {
            self.check_interrupt()?;

            let repo = Repository::from_url(url, storage);
            if let Some(first) = claimed.get(&repo) {
                if *first != url.as_str() {
                    warn!(
                        "'{}' and '{}' share the directory '{}'; skipping the latter.",
                        first,
                        url,
                        repo.local_path().display()
                    );
                }
                continue;
            }
            claimed.insert(repo.clone(), url);

            info!("Processing the '{}' repository.", repo.url());
            let pb = self.progress.add(ProgressBar::new_spinner());
            pb.set_style(spinner_style());
            pb.set_message(format!("syncing {}", repo.url()));
            pb.enable_steady_tick(Duration::from_millis(80));

            match sync_repository(&repo, cache, self.vcs) {
                Ok(outcome) => {
                    pb.set_style(match outcome {
                        Outcome::Skipped | Outcome::Unchanged => skip_style(),
                        _ => ok_style(),
                    });
                    pb.finish_with_message(format!("{} ({})", repo.url(), outcome));
                    info!("Mirror for the '{}' repository: {}.", repo.url(), outcome);
                    summary.record(outcome);
                }
                Err(e) => {
                    pb.set_style(err_style());
                    pb.finish_with_message(format!("{} (error: {})", repo.url(), e));
                    // A child killed by the same signal fails on its own; report the signal.
                    self.check_interrupt()?;
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }
}

/// Command-line overrides for the profile's default locations.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub settings: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// CLI command: run a backup or mirror session for `profile`.
///
/// High-level flow:
/// 1. Resolve default locations for the profile and apply overrides.
/// 2. Load and validate the settings file.
/// 3. Pick the git backend named in the settings.
/// 4. Sync every configured repository, one at a time.
pub fn cmd_sync(
    profile: Profile,
    overrides: &Overrides,
    progress: &MultiProgress,
    interrupted: &AtomicBool,
) -> Result<Summary> {
    let p = paths(profile);
    let settings_path = overrides.settings.clone().unwrap_or(p.settings);
    let cache_path = overrides.cache.clone().unwrap_or(p.cache);

    let settings = Settings::load(&settings_path, &p.storage)?;
    info!(
        "Loaded {} repositories from {}; storing under {}.",
        settings.repositories.len(),
        settings_path.display(),
        settings.storage_path.display()
    );
    if settings.repositories.is_empty() {
        warn!("no repositories in {}", settings_path.display());
    }

    let vcs = settings.backend.build();
    let session = Session {
        vcs: &*vcs,
        progress,
        interrupted,
    };
    let summary = session.sync_all(&settings.storage_path, &settings.repositories, &cache_path)?;
    Ok(summary)
}
