use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error};

use super::Vcs;
use crate::error::{Error, Result};

/// [`Vcs`] backed by the `git` executable found on `PATH`.
///
/// Credential prompts are disabled so an unattended run never blocks on a
/// password question; the rest of the environment is inherited.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: OsString,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
        }
    }
}

/// One prepared git invocation.
///
/// `silent` invocations are probes: their output is discarded and their failure
/// is expected, so it is not logged as an error.
struct Invocation {
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    silent: bool,
}

impl Invocation {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            args: args.into_iter().map(|a| a.as_ref().to_os_string()).collect(),
            envs: vec![("GIT_TERMINAL_PROMPT".into(), "0".into())],
            silent: false,
        }
    }

    fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    fn env(mut self, key: &str, value: impl AsRef<OsStr>) -> Self {
        self.envs.push((key.into(), value.as_ref().to_os_string()));
        self
    }
}

impl GitCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn display(&self, inv: &Invocation) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(inv.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self, inv: Invocation) -> Result<()> {
        let command = self.display(&inv);
        debug!("running: {command}");

        let mut cmd = Command::new(&self.program);
        cmd.args(&inv.args).envs(inv.envs.iter().map(|(k, v)| (k, v)));
        if inv.silent {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        let reason = match cmd.status() {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };

        if !inv.silent {
            error!("An error occurred while executing '{command}': {reason}.");
        }
        Err(Error::ExternalProcess { command, reason })
    }
}

fn clone_mirror(url: &str, dest: &Path) -> Invocation {
    Invocation::new([
        OsStr::new("clone"),
        OsStr::new("--mirror"),
        OsStr::new("--no-hardlinks"),
        OsStr::new("--"),
        OsStr::new(url),
        dest.as_os_str(),
    ])
}

fn fetch_all(repo: &Path) -> Invocation {
    Invocation::new([
        OsStr::new("-C"),
        repo.as_os_str(),
        OsStr::new("fetch"),
        OsStr::new("--all"),
        OsStr::new("--verbose"),
    ])
}

fn rev_parse_git_dir(path: &Path) -> Invocation {
    let inv = Invocation::new([
        OsStr::new("-C"),
        path.as_os_str(),
        OsStr::new("rev-parse"),
        OsStr::new("--git-dir"),
    ])
    .silent();
    // Stop discovery at the parent so an enclosing repository does not count.
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            inv.env("GIT_CEILING_DIRECTORIES", parent)
        }
        _ => inv,
    }
}

fn ls_remote(url: &str) -> Invocation {
    Invocation::new(["ls-remote", "--exit-code", "--", url]).silent()
}

impl Vcs for GitCommand {
    fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()> {
        self.run(clone_mirror(url, dest))
    }

    fn fetch_all(&self, repo: &Path) -> Result<()> {
        self.run(fetch_all(repo))
    }

    fn probe_repository_root(&self, path: &Path) -> Result<()> {
        self.run(rev_parse_git_dir(path))
    }

    fn probe_remote(&self, url: &str) -> Result<()> {
        self.run(ls_remote(url))
    }
}
