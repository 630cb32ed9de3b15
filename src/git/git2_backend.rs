use git2::{
    AutotagOption, Cred, Direction, FetchOptions, RemoteCallbacks, Repository, RepositoryOpenFlags,
    build::{CloneLocal, RepoBuilder},
};
use std::path::Path;
use tracing::{debug, error};

use super::Vcs;
use crate::error::{Error, Result};

/// Refspec a mirror clone uses: every ref, force-updated, same name locally.
const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

/// In-process [`Vcs`] built on libgit2.
///
/// libgit2 never prompts; credentials come from the SSH agent or the default
/// credential helper.
#[derive(Debug, Clone, Copy, Default)]
pub struct Libgit2;

/// Build callbacks with SSH-agent credentials enabled.
///
/// If no SSH key is found, it falls back to default credentials.
fn callbacks_with_creds() -> RemoteCallbacks<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });
    cb
}

fn fetch_opts_with_creds() -> FetchOptions<'static> {
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(callbacks_with_creds());
    fo.download_tags(AutotagOption::All);
    fo
}

fn failed(command: String, e: git2::Error, silent: bool) -> Error {
    if !silent {
        error!("An error occurred while executing '{command}': {}.", e.message());
    }
    Error::ExternalProcess {
        command,
        reason: e.message().to_string(),
    }
}

impl Vcs for Libgit2 {
    /// Clone a bare repository whose `origin` fetches every ref, then flag it as
    /// a mirror so later fetches prune deleted refs the way `git clone --mirror` does.
    fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()> {
        let command = format!("libgit2 clone --mirror {} {}", url, dest.display());
        debug!("running: {command}");

        let run = || -> std::result::Result<(), git2::Error> {
            let mut builder = RepoBuilder::new();
            builder
                .bare(true)
                .clone_local(CloneLocal::NoLinks)
                .fetch_options(fetch_opts_with_creds())
                .remote_create(|repo, name, url| repo.remote_with_fetch(name, url, MIRROR_REFSPEC));
            let repo = builder.clone(url, dest)?;
            repo.config()?.set_bool("remote.origin.mirror", true)?;
            Ok(())
        };
        run().map_err(|e| failed(command, e, false))
    }

    /// Fetch every configured remote with its own refspecs.
    fn fetch_all(&self, repo_path: &Path) -> Result<()> {
        let command = format!("libgit2 fetch --all {}", repo_path.display());
        debug!("running: {command}");

        let run = || -> std::result::Result<(), git2::Error> {
            let repo = Repository::open(repo_path)?;
            let names = repo.remotes()?;
            for name in names.iter().flatten() {
                let mut remote = repo.find_remote(name)?;
                let mut fo = fetch_opts_with_creds();
                fo.prune(git2::FetchPrune::On);
                remote.fetch::<&str>(&[], Some(&mut fo), None)?;
            }
            Ok(())
        };
        run().map_err(|e| failed(command, e, false))
    }

    fn probe_repository_root(&self, path: &Path) -> Result<()> {
        let command = format!("libgit2 open {}", path.display());
        Repository::open_ext(path, RepositoryOpenFlags::NO_SEARCH, &[] as &[&std::ffi::OsStr])
            .map(|_| ())
            .map_err(|e| failed(command, e, true))
    }

    fn probe_remote(&self, url: &str) -> Result<()> {
        let command = format!("libgit2 ls-remote {url}");
        let run = || -> std::result::Result<(), git2::Error> {
            let mut remote = git2::Remote::create_detached(url)?;
            let conn = remote.connect_auth(Direction::Fetch, Some(callbacks_with_creds()), None)?;
            if conn.list()?.is_empty() {
                return Err(git2::Error::from_str("remote has no references"));
            }
            Ok(())
        };
        run().map_err(|e| failed(command, e, true))
    }
}
