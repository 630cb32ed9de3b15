use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::error::{Error, Result};
use crate::git::Backend;
use crate::paths::expand_home;

/// Settings file as written by the user.
///
/// Example TOML:
/// ```toml
/// repositories = [
///     "https://github.com/rust-lang/rust.git",
///     "git@example.com:group/project.git",
/// ]
/// storage_path = "~/.repository_mirrors"
/// backend = "git"
/// ```
///
/// `backup_path` is accepted as another name for `storage_path`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    repositories: Vec<String>,
    #[serde(default, alias = "backup_path")]
    storage_path: Option<PathBuf>,
    #[serde(default)]
    backend: Backend,
}

/// Validated settings: unique sorted URLs and an absolute-ish storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repositories: Vec<String>,
    pub storage_path: PathBuf,
    pub backend: Backend,
}

impl Settings {
    /// Normalize user-provided values. Duplicate URLs collapse into one.
    pub fn new<I, S>(
        repositories: I,
        storage_path: &Path,
        backend: Backend,
    ) -> std::result::Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = BTreeSet::new();
        for url in repositories {
            let url = url.into().trim().to_string();
            if url.is_empty() {
                return Err("repository URLs can not be empty".into());
            }
            unique.insert(url);
        }

        if storage_path.as_os_str().is_empty() {
            return Err("path can not be empty".into());
        }

        Ok(Self {
            repositories: unique.into_iter().collect(),
            storage_path: expand_home(storage_path),
            backend,
        })
    }

    /// Parse settings from TOML text. `default_storage` fills in a missing path.
    pub fn from_toml(path: &Path, text: &str, default_storage: &Path) -> Result<Self> {
        let invalid = |reason: String| {
            error!("The settings in '{}' are corrupt or incomplete.", path.display());
            Error::Settings {
                path: path.to_path_buf(),
                reason,
            }
        };

        let raw: RawSettings = toml::from_str(text).map_err(|e| invalid(e.message().to_string()))?;
        let storage = raw.storage_path.unwrap_or_else(|| default_storage.to_path_buf());
        Settings::new(raw.repositories, &storage, raw.backend).map_err(invalid)
    }

    /// Load and validate the settings file at `path`.
    pub fn load(path: &Path, default_storage: &Path) -> Result<Self> {
        let path = expand_home(path);
        let text = fs::read_to_string(&path).map_err(|e| {
            error!("It is impossible to load the settings from '{}'.", path.display());
            Error::fs(&path, e)
        })?;
        Self::from_toml(&path, &text, default_storage)
    }
}
