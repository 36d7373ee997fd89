//! Fetch the raw dataset over HTTP and write it to disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::http_client::{self, RetryConfig};

const MAX_DATA_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Invalid data URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Failed to fetch {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: usize,
        last: String,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl AcquireError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// GET `url`, retrying failed attempts with exponential backoff.
pub fn get_data(url: &str, retry: RetryConfig) -> Result<Vec<u8>, AcquireError> {
    let parsed = url::Url::parse(url).map_err(|source| AcquireError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let mut attempts = 0usize;
    let result = http_client::retry_with_backoff(
        retry,
        || {
            attempts += 1;
            fetch_once(parsed.as_str())
        },
        |_| true,
        |attempt, err, delay| {
            warn!(
                "Attempt {attempt} to fetch {url} failed: {err}; retrying in {:.1}s",
                delay.as_secs_f64()
            );
        },
    );
    match result {
        Ok(bytes) => {
            info!("Fetched {} bytes from {url}", bytes.len());
            Ok(bytes)
        }
        Err(last) => Err(AcquireError::Exhausted {
            url: url.to_string(),
            attempts,
            last,
        }),
    }
}

fn fetch_once(url: &str) -> Result<Vec<u8>, String> {
    match http_client::agent().get(url).call() {
        Ok(response) => http_client::read_response_bytes(response, MAX_DATA_BYTES)
            .map_err(|err| err.to_string()),
        Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {code}")),
        Err(ureq::Error::Transport(err)) => Err(err.to_string()),
    }
}

/// Write `bytes` to `path`, creating parent directories as needed.
pub fn write_data(bytes: &[u8], path: &Path) -> Result<(), AcquireError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AcquireError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| AcquireError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Raw data written to {}", path.display());
    Ok(())
}

/// Fetch `url` and store the body at `path`.
pub fn acquire_data(url: &str, path: &Path, retry: RetryConfig) -> Result<(), AcquireError> {
    let bytes = get_data(url, retry)?;
    write_data(&bytes, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::test_server;
    use std::time::Duration;
    use tempfile::tempdir;

    fn instant(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 2,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn retries_until_success() {
        let base = test_server::serve(vec![
            test_server::status(503),
            test_server::status(500),
            test_server::ok("1 2 3\n"),
        ]);
        let bytes = get_data(&format!("{base}/cloud.data"), instant(4)).unwrap();
        assert_eq!(bytes, b"1 2 3\n");
    }

    #[test]
    fn gives_up_after_configured_attempts() {
        let base = test_server::serve(vec![
            test_server::status(500),
            test_server::status(500),
            test_server::ok("late"),
        ]);
        match get_data(&base, instant(2)).unwrap_err() {
            AcquireError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "HTTP 500");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn rejects_malformed_url_without_retrying() {
        assert!(matches!(
            get_data("not a url", instant(4)),
            Err(AcquireError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("raw").join("clouds.data");
        write_data(b"abc", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn write_into_a_file_path_is_file_access_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_data(b"abc", &blocker.join("clouds.data")).unwrap_err();
        assert!(err.is_file_access());
    }

    #[test]
    fn acquire_writes_fetched_body() {
        let base = test_server::serve(vec![test_server::ok("4 5 6\n")]);
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.data");
        acquire_data(&base, &path, instant(1)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4 5 6\n");
    }
}
