use clap::ValueEnum;
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::Level;

/// The two front-ends the tool ships as. They share the engine and differ only
/// in default locations and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Keep backups under `~/.backup_repositories`.
    Backup,
    /// Keep mirrors under `~/.repository_mirrors`.
    Mirror,
}

/// Where a log file goes and how it is maintained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    /// Rotate once the file grows past this many bytes.
    pub max_bytes: Option<u64>,
    pub backups: usize,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub settings: PathBuf,
    pub cache: PathBuf,
    pub storage: PathBuf,
    pub log: LogFile,
    pub level: Level,
    /// Console log lines go to stdout instead of stderr.
    pub log_to_stdout: bool,
}

pub fn home() -> PathBuf {
    PathBuf::from(env::var_os("HOME").unwrap_or_default())
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

pub fn paths(profile: Profile) -> Paths {
    let home = home();
    match profile {
        Profile::Backup => Paths {
            settings: home.join(".git_backupper.toml"),
            cache: home.join(".git_backupper.cache"),
            storage: home.join(".backup_repositories"),
            log: LogFile {
                path: env::temp_dir().join("git-backupper.log"),
                max_bytes: None,
                backups: 0,
            },
            level: Level::WARN,
            log_to_stdout: true,
        },
        Profile::Mirror => Paths {
            settings: home.join(".git_mirrors.toml"),
            cache: home.join(".git_mirrors.cache"),
            storage: home.join(".repository_mirrors"),
            log: LogFile {
                path: home.join(".git_mirrors.log"),
                max_bytes: Some(50 * 1024 * 1024),
                backups: 2,
            },
            level: Level::INFO,
            log_to_stdout: false,
        },
    }
}
