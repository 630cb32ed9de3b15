use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cache::PersistentCache;
use crate::paths::{Profile, paths};
use crate::repository::Repository;
use crate::settings::Settings;
use crate::sync::Overrides;

/// What is known locally about one configured repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub url: String,
    pub local_path: std::path::PathBuf,
    pub present: bool,
    /// Number of files in the cached snapshot, if there is one.
    pub cached_files: Option<usize>,
}

/// Collect one [`Entry`] per configured repository. Never touches git or writes.
pub fn collect(settings: &Settings, cache_path: &Path) -> Result<Vec<Entry>> {
    let cache = PersistentCache::open(cache_path)?;
    let entries = settings
        .repositories
        .iter()
        .map(|url| {
            let repo = Repository::from_url(url, &settings.storage_path);
            Entry {
                url: url.clone(),
                present: repo.local_path().is_dir(),
                cached_files: cache.get(&repo).map(|s| s.len()),
                local_path: repo.local_path().to_path_buf(),
            }
        })
        .collect();
    cache.discard();
    Ok(entries)
}

/// CLI command: print configured repositories with their local state.
///
/// Example output:
/// ```text
/// - https://example.com/group/proj.git
///     /home/user/.repository_mirrors/proj.git [present, 42 files cached]
/// - https://example.com/group/new
///     /home/user/.repository_mirrors/new.git [missing, not cached]
/// ```
pub fn cmd_list(profile: Profile, overrides: &Overrides) -> Result<()> {
    let p = paths(profile);
    let settings_path = overrides.settings.clone().unwrap_or(p.settings);
    let cache_path = overrides.cache.clone().unwrap_or(p.cache);
    let settings = Settings::load(&settings_path, &p.storage)?;

    for e in collect(&settings, &cache_path)? {
        let present = if e.present {
            "present".green()
        } else {
            "missing".yellow()
        };
        let cached = match e.cached_files {
            Some(n) => format!("{n} files cached").normal(),
            None => "not cached".yellow(),
        };
        println!("- {}", e.url.bold());
        println!("    {} [{}, {}]", e.local_path.display(), present, cached);
    }
    Ok(())
}
