//! # git-mirrors
//!
//! Keep mirror clones of remote git repositories and notice when they rot.
//!
//! Features:
//! - `git-mirrors mirror` mirrors the repositories listed in `~/.git_mirrors.toml`
//! - `git-mirrors backup` does the same with the backup profile (`~/.git_backupper.toml`)
//! - `git-mirrors list` shows every configured repository with its local state
//! - `git-mirrors paths` prints the settings, cache, storage and log locations
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use git_mirrors::logging::{self, LogConfig};
use git_mirrors::{Error, Overrides, Profile, cmd_list, cmd_sync, paths};
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::Level;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "git-mirrors",
    version,
    about = "Simplest way to back up and mirror git repositories",
    arg_required_else_help = true
)]
struct Cli {
    /// Generate extensive debugging output during command execution
    #[arg(short, long, global = true)]
    debug: bool,

    /// Read settings from this file instead of the profile default
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Keep the checksum cache in this file instead of the profile default
    #[arg(long, global = true, value_name = "PATH")]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Back up the configured repositories
    Backup,
    /// Mirror the configured repositories
    Mirror,
    /// List configured repositories with their local and cached state
    List {
        #[arg(value_enum, default_value_t = Profile::Mirror)]
        profile: Profile,
    },
    /// Print the settings, cache, storage and log paths of a profile
    Paths {
        #[arg(value_enum, default_value_t = Profile::Mirror)]
        profile: Profile,
    },
}

fn run_sync(profile: Profile, cli: &Cli, overrides: &Overrides) -> Result<()> {
    let p = paths(profile);
    let progress = MultiProgress::new();
    logging::init(
        &LogConfig {
            level: if cli.debug { Level::DEBUG } else { p.level },
            to_stdout: p.log_to_stdout,
            file: Some(p.log),
        },
        &progress,
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&interrupted))
            .context("install signal handler")?;
    }

    cmd_sync(profile, overrides, &progress, &interrupted)?;
    Ok(())
}

fn run(cli: &Cli, cmd: &Cmd) -> Result<()> {
    let overrides = Overrides {
        settings: cli.settings.clone(),
        cache: cli.cache.clone(),
    };

    match cmd {
        Cmd::Backup => run_sync(Profile::Backup, cli, &overrides),
        Cmd::Mirror => run_sync(Profile::Mirror, cli, &overrides),
        Cmd::List { profile } => cmd_list(*profile, &overrides),
        Cmd::Paths { profile } => {
            let p = paths(*profile);
            let settings = overrides.settings.unwrap_or(p.settings);
            let cache = overrides.cache.unwrap_or(p.cache);
            println!("settings: {}", settings.display());
            println!("cache:    {}", cache.display());
            println!("storage:  {}", p.storage.display());
            println!("log:      {}", p.log.path.display());
            Ok(())
        }
    }
}

/// CLI entry point.
///
/// Domain errors exit with `EPERM` (1); an interrupt exits with `EINTR` (4).
fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(cmd) = cli.cmd.as_ref() else {
        return ExitCode::SUCCESS;
    };

    match run(&cli, cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<Error>().map_or(1, Error::exit_code);
            if code == Error::Interrupted.exit_code() {
                tracing::error!("Abort this program runtime as a consequence of an interrupt.");
            } else {
                tracing::debug!("An unexpected error occurred at this program runtime: {e:?}");
            }
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::from(code)
        }
    }
}
