//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Default User-Agent (overridable per target)
//! - Per-request timeout and extra headers
//! - Idle-bounded streaming GETs for large downloads
//! - Classification of failures into timeout / status / network

use crate::error::{ConfigError, DownloadError, ManifestError};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default User-Agent header
const DEFAULT_USER_AGENT: &str = concat!("upkeep/", env!("CARGO_PKG_VERSION"));

/// Default connect timeout; full request timeouts are set per call
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a streamed transfer, however steadily data arrives
pub const STREAM_HARD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Why a GET did not produce a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// Request exceeded its timeout
    Timeout,
    /// Server answered with a non-success status
    Status(u16),
    /// Any other transport failure
    Network(String),
}

impl RequestFailure {
    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestFailure::Timeout
        } else if let Some(status) = err.status() {
            RequestFailure::Status(status.as_u16())
        } else {
            RequestFailure::Network(err.to_string())
        }
    }

    /// Convert into a manifest-stage error
    pub fn into_manifest_error(self, url: &str) -> ManifestError {
        match self {
            RequestFailure::Timeout => ManifestError::Timeout {
                url: url.to_string(),
            },
            RequestFailure::Status(status) => ManifestError::HttpStatus {
                url: url.to_string(),
                status,
            },
            RequestFailure::Network(message) => ManifestError::network(url, message),
        }
    }

    /// Convert into a download-stage error
    pub fn into_download_error(self, url: &str) -> DownloadError {
        match self {
            RequestFailure::Timeout => DownloadError::Timeout {
                url: url.to_string(),
            },
            RequestFailure::Status(status) => DownloadError::HttpStatus {
                url: url.to_string(),
                status,
            },
            RequestFailure::Network(message) => DownloadError::Network {
                url: url.to_string(),
                message,
            },
        }
    }
}

/// HTTP client wrapper shared by the manifest client and the archive fetcher
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with a custom default User-Agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Perform a single GET bounded by `timeout` end to end; non-2xx statuses
    /// are returned as failures
    pub async fn get(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Response, RequestFailure> {
        let response = self
            .request(url, headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| RequestFailure::from_reqwest(&e))?;

        check_status(response)
    }

    /// Start a GET whose body will be streamed.
    ///
    /// Only the wait for the response head is bounded by `idle`; the caller
    /// bounds the gaps between body chunks. `STREAM_HARD_TIMEOUT` caps the
    /// whole transfer so a connection that keeps trickling still ends.
    pub async fn get_streaming(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        idle: Duration,
    ) -> Result<Response, RequestFailure> {
        let send = self
            .request(url, headers)
            .timeout(STREAM_HARD_TIMEOUT)
            .send();

        let response = tokio::time::timeout(idle, send)
            .await
            .map_err(|_| RequestFailure::Timeout)?
            .map_err(|e| RequestFailure::from_reqwest(&e))?;

        check_status(response)
    }

    fn request(&self, url: &str, headers: &BTreeMap<String, String>) -> RequestBuilder {
        headers
            .iter()
            .fold(self.client.get(url), |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
    }
}

fn check_status(response: Response) -> Result<Response, RequestFailure> {
    let status = response.status();
    if !status.is_success() {
        return Err(RequestFailure::Status(status.as_u16()));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new().is_ok());
    }

    #[test]
    fn test_http_client_with_user_agent() {
        assert!(HttpClient::with_user_agent("Mozilla/5.0").is_ok());
    }

    #[test]
    fn test_default_user_agent() {
        assert!(DEFAULT_USER_AGENT.starts_with("upkeep/"));
    }

    #[test]
    fn test_failure_into_manifest_error() {
        let err = RequestFailure::Status(503).into_manifest_error("http://x/v.json");
        assert_eq!(
            err,
            ManifestError::HttpStatus {
                url: "http://x/v.json".to_string(),
                status: 503
            }
        );
        assert!(err.is_retryable());

        let err = RequestFailure::Timeout.into_manifest_error("http://x");
        assert!(matches!(err, ManifestError::Timeout { .. }));
    }

    #[test]
    fn test_failure_into_download_error() {
        let err = RequestFailure::Network("refused".to_string()).into_download_error("http://x");
        assert!(err.to_string().contains("refused"));
    }
}
