// src/repository/client.rs

//! Index transport
//!
//! [`IndexTransport`] is the seam between the fetcher and the network. The
//! production [`RepositoryClient`] wraps a blocking reqwest client with retry
//! support and implements the conditional-GET contract: callers pass the
//! modification marker they already hold and get back `NotModified` when the
//! remote has nothing newer. `file://` URLs are served from local mirrors
//! using the file's mtime as the marker.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for HTTP requests (5 minutes; Packages files are large)
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on buffer space reserved from `Content-Length`
const MAX_PREALLOCATE: u64 = 64 * 1024 * 1024;

/// Result of a conditional fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// Remote content is not newer than the caller's marker
    NotModified,
    /// Fresh content with the remote's modification marker, if it sent one
    Fetched {
        body: Vec<u8>,
        last_modified: Option<DateTime<Utc>>,
    },
}

/// Conditional retrieval of one URL
pub trait IndexTransport: Send + Sync {
    /// Fetch `url`, returning `NotModified` if it has not changed since `since`
    fn fetch(&self, url: &Url, since: Option<DateTime<Utc>>) -> Result<FetchResponse>;
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

/// Why a single HTTP attempt did not produce a response
#[derive(Debug)]
enum AttemptError {
    /// Worth another attempt: transport errors, server errors, truncated bodies
    Transient(String),
    Fatal(Error),
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    fn fetch_http(&self, url: &Url, since: Option<DateTime<Utc>>) -> Result<FetchResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let reason = match self.attempt(url, since) {
                Ok(response) => return Ok(response),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(reason)) => reason,
            };

            if attempt >= self.max_retries {
                return Err(Error::DownloadError(format!(
                    "Failed to fetch {url} after {attempt} attempts: {reason}"
                )));
            }
            warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, reason);
            std::thread::sleep(self.retry_delay * attempt);
        }
    }

    /// One conditional GET, streaming the body into memory
    fn attempt(
        &self,
        url: &Url,
        since: Option<DateTime<Utc>>,
    ) -> std::result::Result<FetchResponse, AttemptError> {
        let mut request = self.client.get(url.as_str());
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, format_http_date(since));
        }

        let mut response = request
            .send()
            .map_err(|e| AttemptError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("{} not modified", url);
            return Ok(FetchResponse::NotModified);
        }
        if is_retryable(status) {
            return Err(AttemptError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(Error::DownloadError(format!(
                "HTTP {status} from {url}"
            ))));
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);

        let capacity = response.content_length().unwrap_or(0).min(MAX_PREALLOCATE) as usize;
        let mut body = Vec::with_capacity(capacity);
        let read = response
            .copy_to(&mut body)
            .map_err(|e| AttemptError::Transient(format!("Failed to read response: {e}")))?;

        debug!("Fetched {} bytes from {}", read, url);
        Ok(FetchResponse::Fetched {
            body,
            last_modified,
        })
    }
}

/// Server-side failures and throttling are retried; other statuses are final
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl IndexTransport for RepositoryClient {
    fn fetch(&self, url: &Url, since: Option<DateTime<Utc>>) -> Result<FetchResponse> {
        match url.scheme() {
            "file" => fetch_file(url, since),
            "http" | "https" => self.fetch_http(url, since),
            other => Err(Error::ConfigError(format!(
                "Unsupported URL scheme '{other}' in {url}"
            ))),
        }
    }
}

/// Serve a `file://` URL with mtime-based conditional semantics
pub fn fetch_file(url: &Url, since: Option<DateTime<Utc>>) -> Result<FetchResponse> {
    let path = url
        .to_file_path()
        .map_err(|_| Error::ConfigError(format!("Invalid file URL {url}")))?;

    let metadata = std::fs::metadata(&path)
        .map_err(|e| Error::DownloadError(format!("Failed to stat {}: {e}", path.display())))?;
    let modified = metadata
        .modified()
        .map(|mtime| truncate_to_seconds(DateTime::<Utc>::from(mtime)))
        .ok();

    if let (Some(since), Some(modified)) = (since, modified) {
        if modified <= since {
            return Ok(FetchResponse::NotModified);
        }
    }

    let body = std::fs::read(&path)
        .map_err(|e| Error::DownloadError(format!("Failed to read {}: {e}", path.display())))?;

    Ok(FetchResponse::Fetched {
        body,
        last_modified: modified,
    })
}

/// Format a timestamp as an RFC 7231 HTTP-date
pub fn format_http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP-date header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// HTTP dates carry whole seconds; markers are compared at that precision
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}
