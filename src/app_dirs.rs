//! Where the pipeline keeps its own files (currently only logs).
//!
//! The root is `<data dir>/.cloudcls`, where `<data dir>` is the OS local data
//! directory unless `CLOUDCLS_HOME` names another one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = ".cloudcls";
/// Environment variable that replaces the OS data directory.
pub const HOME_ENV: &str = "CLOUDCLS_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No data directory available; set {HOME_ENV}")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolved application directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Resolve the layout from `CLOUDCLS_HOME` or the OS data directory.
    pub fn resolve() -> Result<Self, AppDirError> {
        let base = pick_base(std::env::var_os(HOME_ENV), || {
            BaseDirs::new().map(|dirs| dirs.data_local_dir().to_path_buf())
        })
        .ok_or(AppDirError::NoBaseDir)?;
        Ok(Self::under(&base))
    }

    /// Layout rooted at `<base>/.cloudcls`.
    pub fn under(base: &Path) -> Self {
        Self {
            root: base.join(APP_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The logs directory, created on demand.
    pub fn logs(&self) -> Result<PathBuf, AppDirError> {
        let path = self.root.join(LOGS_DIR_NAME);
        std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn pick_base(
    env_value: Option<OsString>,
    os_default: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    match env_value {
        Some(value) if !value.to_string_lossy().trim().is_empty() => Some(PathBuf::from(value)),
        _ => os_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn env_value_wins_over_os_default() {
        let picked = pick_base(Some(OsString::from("/srv/cloudcls")), || {
            Some(PathBuf::from("/home/user/.local/share"))
        });
        assert_eq!(picked, Some(PathBuf::from("/srv/cloudcls")));
    }

    #[test]
    fn blank_env_value_falls_back() {
        let picked = pick_base(Some(OsString::from("  ")), || Some(PathBuf::from("/data")));
        assert_eq!(picked, Some(PathBuf::from("/data")));
        assert_eq!(pick_base(None, || None), None);
    }

    #[test]
    fn logs_dir_is_created_under_root() {
        let base = tempdir().unwrap();
        let dirs = AppDirs::under(base.path());
        assert_eq!(dirs.root(), base.path().join(APP_DIR_NAME));
        let logs = dirs.logs().unwrap();
        assert_eq!(logs, base.path().join(".cloudcls").join("logs"));
        assert!(logs.is_dir());
    }
}
