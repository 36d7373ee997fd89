//! Upload run artifacts to S3-compatible object storage.
//!
//! Every regular file under a directory becomes one object whose key is the
//! configured prefix joined with the file's relative path.

pub mod sigv4;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{MissingKey, require};
use crate::http_client;
use sigv4::{Credentials, SignatureInput, SigningError, SigningTime};

const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    MissingKey(#[from] MissingKey),
    #[error("Missing credentials: set {0}")]
    Credentials(&'static str),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Upload of `{key}` failed: {message}")]
    Http { key: String, message: String },
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl StorageError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Upload the run directory at the end of a pipeline run.
    pub upload: bool,
    pub bucket_name: Option<String>,
    pub prefix: String,
    /// Falls back to `AWS_REGION`, then `us-east-1`.
    pub region: Option<String>,
    /// Custom S3-compatible endpoint, addressed path-style.
    pub endpoint: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            upload: false,
            bucket_name: None,
            prefix: "experiments".to_string(),
            region: None,
            endpoint: None,
        }
    }
}

/// Destination for uploaded objects.
pub trait ObjectStore {
    /// Store `bytes` under `key` and return the remote locator.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

/// S3 (or S3-compatible) bucket reached over HTTPS with SigV4 signing.
#[derive(Debug, Clone)]
pub struct S3Store {
    bucket: String,
    region: String,
    /// Base URL objects are addressed under; the bucket is already part of it.
    base_url: String,
    credentials: Credentials,
}

impl S3Store {
    pub fn new(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: Credentials,
    ) -> Self {
        let base_url = match endpoint {
            Some(endpoint) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{region}.amazonaws.com"),
        };
        Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            base_url,
            credentials,
        }
    }

    /// Build a store from configuration plus `AWS_*` environment credentials.
    pub fn from_config(config: &AwsConfig) -> Result<Self, StorageError> {
        let bucket = require(&config.bucket_name, "aws.bucket_name")?;
        let credentials = credentials_from_env()?;
        let region = config
            .region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .unwrap_or_else(|| "us-east-1".to_string());
        Ok(Self::new(bucket, &region, config.endpoint.as_deref(), credentials))
    }

    fn locator(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let url = format!("{}{}", self.base_url, sigv4::encode_path(&format!("/{key}")));
        let parsed = url::Url::parse(&url).map_err(|err| StorageError::Http {
            key: key.to_string(),
            message: format!("Invalid object URL {url}: {err}"),
        })?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(StorageError::Http {
                    key: key.to_string(),
                    message: format!("Object URL {url} has no host"),
                });
            }
        };
        let time = SigningTime::from_datetime(time::OffsetDateTime::now_utc())?;
        let payload_hash = sigv4::sha256_hex(&bytes);
        let mut headers = vec![
            ("host".to_string(), host),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), time.amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        let authorization = sigv4::authorization(
            &SignatureInput {
                method: "PUT",
                canonical_uri: parsed.path(),
                headers: &headers,
                payload_hash: &payload_hash,
                region: &self.region,
                service: "s3",
                time: &time,
            },
            &self.credentials,
        )?;

        let mut request = http_client::agent()
            .put(&url)
            .set("Authorization", &authorization);
        for (name, value) in &headers {
            request = request.set(name, value);
        }
        match request.send_bytes(&bytes) {
            Ok(_) => {}
            Err(ureq::Error::Status(code, response)) => {
                let body = http_client::read_response_bytes(response, MAX_ERROR_BODY_BYTES)
                    .map(|body| String::from_utf8_lossy(&body).into_owned())
                    .unwrap_or_default();
                return Err(StorageError::Http {
                    key: key.to_string(),
                    message: format!("HTTP {code}: {}", body.trim()),
                });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(StorageError::Http {
                    key: key.to_string(),
                    message: err.to_string(),
                });
            }
        }
        let locator = self.locator(key);
        debug!("Uploaded {locator}");
        Ok(locator)
    }
}

fn credentials_from_env() -> Result<Credentials, StorageError> {
    let var = |name: &'static str| {
        std::env::var(name)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or(StorageError::Credentials(name))
    };
    Ok(Credentials {
        access_key_id: var("AWS_ACCESS_KEY_ID")?,
        secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
        session_token: var("AWS_SESSION_TOKEN").ok(),
    })
}

/// Upload every file under `dir` to the configured bucket.
pub fn upload_artifacts(dir: &Path, config: &AwsConfig) -> Result<Vec<String>, StorageError> {
    let store = S3Store::from_config(config)?;
    upload_dir(dir, &config.prefix, &store)
}

/// Upload every regular file under `dir`, in path order, keyed `<prefix>/<relative path>`.
pub fn upload_dir(
    dir: &Path,
    prefix: &str,
    store: &dyn ObjectStore,
) -> Result<Vec<String>, StorageError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    let prefix = prefix.trim_matches('/');
    let mut locators = Vec::with_capacity(files.len());
    for path in files {
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let key = if prefix.is_empty() {
            relative
        } else {
            format!("{prefix}/{relative}")
        };
        let bytes = std::fs::read(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        locators.push(store.put(&key, bytes)?);
    }
    info!("Uploaded {} file(s) from {}", locators.len(), dir.display());
    Ok(locators)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}
