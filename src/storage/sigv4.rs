//! AWS Signature Version 4 request signing.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid HMAC key: {0}")]
    Key(String),
    #[error("Failed to format request time: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Request timestamps in the two layouts SigV4 needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningTime {
    /// `YYYYMMDD'T'HHMMSS'Z'`, sent as `x-amz-date`.
    pub amz_date: String,
    /// `YYYYMMDD`, used in the credential scope.
    pub date: String,
}

impl SigningTime {
    pub fn from_datetime(at: OffsetDateTime) -> Result<Self, SigningError> {
        let at = at.to_offset(time::UtcOffset::UTC);
        Ok(Self {
            amz_date: at.format(format_description!("[year][month][day]T[hour][minute][second]Z"))?,
            date: at.format(format_description!("[year][month][day]"))?,
        })
    }
}

/// Everything that goes into one signature.
#[derive(Debug)]
pub struct SignatureInput<'a> {
    pub method: &'a str,
    /// Already URI-encoded absolute path, see [`encode_path`].
    pub canonical_uri: &'a str,
    /// Headers to sign; `host` and `x-amz-date` must be among them.
    pub headers: &'a [(String, String)],
    pub payload_hash: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub time: &'a SigningTime,
}

/// Build the `Authorization` header value for a request without a query string.
pub fn authorization(
    input: &SignatureInput<'_>,
    credentials: &Credentials,
) -> Result<String, SigningError> {
    let mut headers: Vec<(String, String)> = input
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        input.method, input.canonical_uri, canonical_headers, signed_headers, input.payload_hash
    );

    let scope = format!(
        "{}/{}/{}/aws4_request",
        input.time.date, input.region, input.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        input.time.amz_date,
        sha256_hex(canonical_request.as_bytes())
    );
    let key = signing_key(
        &credentials.secret_access_key,
        &input.time.date,
        input.region,
        input.service,
    )?;
    let signature = format!("{:x}", hmac(&key, string_to_sign.as_bytes())?.into_bytes());
    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    ))
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?.into_bytes();
    let k_region = hmac(&k_date, region.as_bytes())?.into_bytes();
    let k_service = hmac(&k_region, service.as_bytes())?.into_bytes();
    Ok(hmac(&k_service, b"aws4_request")?.into_bytes().to_vec())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// URI-encode a path, leaving unreserved characters and `/` as is.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Result<hmac::digest::CtOutput<HmacSha256>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| SigningError::Key(err.to_string()))?;
    mac.update(data);
    Ok(mac.finalize())
}
