use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::Vcs;
use crate::error::{Error, Result};

/// Filesystem-only stand-in for git used by engine tests.
///
/// A "repository root" is any directory holding a `HEAD` file. Clones lay down a
/// small fixed tree derived from the URL, fetches rewrite `FETCH_HEAD`.
#[derive(Default)]
pub struct FakeVcs {
    reachable: HashSet<String>,
    pub fail_fetch: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeVcs {
    pub fn with_remotes<I: IntoIterator<Item = S>, S: Into<String>>(urls: I) -> Self {
        Self {
            reachable: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn fail(call: &str) -> Error {
        Error::ExternalProcess {
            command: call.to_string(),
            reason: "exit status: 128".into(),
        }
    }
}

fn write(path: PathBuf, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

impl Vcs for FakeVcs {
    fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(format!("clone {url}"));
        if !self.reachable.contains(url) || dest.exists() {
            return Err(Self::fail("clone"));
        }
        (|| -> std::io::Result<()> {
            write(dest.join("HEAD"), "ref: refs/heads/main\n")?;
            write(dest.join("config"), &format!("[remote \"origin\"]\n\turl = {url}\n"))?;
            write(dest.join("packed-refs"), "0123456789abcdef refs/heads/main\n")?;
            fs::create_dir_all(dest.join("objects/pack"))?;
            Ok(())
        })()
        .map_err(|e| Error::fs(dest, e))
    }

    fn fetch_all(&self, repo: &Path) -> Result<()> {
        self.record(format!("fetch {}", repo.display()));
        if self.fail_fetch || !repo.join("HEAD").is_file() {
            return Err(Self::fail("fetch"));
        }
        write(repo.join("FETCH_HEAD"), "0123456789abcdef\t\tbranch 'main'\n")
            .map_err(|e| Error::fs(repo, e))
    }

    fn probe_repository_root(&self, path: &Path) -> Result<()> {
        self.record(format!("rev-parse {}", path.display()));
        if path.join("HEAD").is_file() {
            Ok(())
        } else {
            Err(Self::fail("rev-parse"))
        }
    }

    fn probe_remote(&self, url: &str) -> Result<()> {
        self.record(format!("ls-remote {url}"));
        if self.reachable.contains(url) {
            Ok(())
        } else {
            Err(Self::fail("ls-remote"))
        }
    }
}
