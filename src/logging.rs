//! Tracing setup for the pipeline binary.
//!
//! Output goes to stdout and to `cloudcls_<local time>.log` in the logs
//! directory. Only the newest [`KEEP_LOG_FILES`] launch logs are kept.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::app_dirs::{AppDirError, AppDirs};

pub const KEEP_LOG_FILES: usize = 10;
const FILE_PREFIX: &str = "cloudcls_";
const FILE_SUFFIX: &str = ".log";

const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
const LINE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Log file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to name log file: {0}")]
    Stamp(#[from] time::error::Format),
    #[error("A tracing subscriber is already installed: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber, logging under the application directory.
///
/// Calling this again after a successful install does nothing.
pub fn init() -> Result<(), LoggingError> {
    if FILE_WRITER_GUARD.get().is_some() {
        return Ok(());
    }
    let logs = AppDirs::resolve()?.logs()?;
    init_in(&logs)
}

/// Install the global subscriber with launch logs written into `log_dir`.
pub fn init_in(log_dir: &Path) -> Result<(), LoggingError> {
    if FILE_WRITER_GUARD.get().is_some() {
        return Ok(());
    }
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let log_path = log_dir.join(log_file_name(OffsetDateTime::now_utc().to_offset(offset))?);
    let file = open_append(&log_path)?;
    prune_launch_logs(log_dir, KEEP_LOG_FILES)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::OffsetTime::new(offset, LINE_STAMP)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(fmt::time::OffsetTime::new(offset, LINE_STAMP))
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = FILE_WRITER_GUARD.set(guard);

    tracing::debug!("Logging to {}", log_path.display());
    Ok(())
}

fn log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    Ok(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", now.format(FILE_STAMP)?))
}

fn open_append(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::File {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete the oldest launch logs so at most `keep` remain.
///
/// Launch log names embed a zero-padded timestamp, so name order is age order.
/// Files that are not launch logs are left alone.
fn prune_launch_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::File {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut launch_logs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_launch_log(path))
        .collect();
    launch_logs.sort();
    let excess = launch_logs.len().saturating_sub(keep);
    for path in launch_logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::File { path, source })?;
    }
    Ok(())
}

fn is_launch_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
}
