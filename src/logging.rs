//! Logger construction for the binary.
//!
//! Library code only emits `tracing` events; the entry point decides where they
//! go by calling [`init`] once. Console lines are routed through the progress
//! display so they never tear a running spinner.

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, fmt::MakeWriter, prelude::*};

use crate::paths::LogFile;

/// Everything [`init`] needs to know.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default verbosity; `RUST_LOG` overrides it.
    pub level: Level,
    pub to_stdout: bool,
    pub file: Option<LogFile>,
}

/// Hands out one buffered line per event; the line is printed with the progress
/// bars suspended when the event is complete.
#[derive(Clone)]
struct ConsoleWriter {
    progress: MultiProgress,
    to_stdout: bool,
}

struct ConsoleLine {
    progress: MultiProgress,
    to_stdout: bool,
    buf: Vec<u8>,
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine {
            progress: self.progress.clone(),
            to_stdout: self.to_stdout,
            buf: Vec::new(),
        }
    }
}

impl Write for ConsoleLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        let to_stdout = self.to_stdout;
        self.progress.suspend(|| {
            let _ = if to_stdout {
                io::stdout().write_all(&buf)
            } else {
                io::stderr().write_all(&buf)
            };
        });
    }
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".{n}"));
    PathBuf::from(s)
}

/// Shift `log.1 → log.2 …` and move the live file to `log.1` once it has grown
/// past the configured size. Without backups the file is simply truncated.
pub fn rotate(log: &LogFile) -> io::Result<()> {
    let Some(max) = log.max_bytes else {
        return Ok(());
    };
    match fs::metadata(&log.path) {
        Ok(m) if m.len() > max => {}
        Ok(_) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }

    if log.backups == 0 {
        return fs::remove_file(&log.path);
    }
    for n in (1..log.backups).rev() {
        let from = numbered(&log.path, n);
        if from.exists() {
            fs::rename(&from, numbered(&log.path, n + 1))?;
        }
    }
    fs::rename(&log.path, numbered(&log.path, 1))
}

fn open_log(log: &LogFile) -> Result<File> {
    rotate(log).with_context(|| format!("rotate {}", log.path.display()))?;
    if let Some(parent) = log.path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log.path)
        .with_context(|| format!("open log file {}", log.path.display()))
}

/// Install the global subscriber: console layer plus an optional plain-text file layer.
///
/// A log file that cannot be opened is reported and skipped; it never stops a run.
pub fn init(config: &LogConfig, progress: &MultiProgress) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let console = fmt::layer().with_target(true).with_writer(ConsoleWriter {
        progress: progress.clone(),
        to_stdout: config.to_stdout,
    });

    let (file, file_err) = match config.file.as_ref().map(open_log) {
        Some(Ok(f)) => (Some(f), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(f))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;

    if let Some(e) = file_err {
        tracing::warn!("logging to console only: {e:#}");
    }
    Ok(())
}
