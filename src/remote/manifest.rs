//! Remote version manifest client
//!
//! Fetches the JSON document describing currently published versions.
//! Transport failures are retried per the injected [`RetryPolicy`]; a body
//! that is not a JSON object, or one missing required keys, is surfaced
//! immediately.

use crate::error::ManifestError;
use crate::remote::{HttpClient, RequestFailure, RetryPolicy};
use std::collections::BTreeMap;
use std::time::Duration;

/// Published versions keyed by component key (e.g. `version_python`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteManifest {
    values: BTreeMap<String, String>,
}

impl RemoteManifest {
    /// Build from a decoded JSON value; `None` unless it is an object.
    ///
    /// String values are kept verbatim and numbers are stringified; other
    /// value types are dropped and therefore count as missing.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        let serde_json::Value::Object(map) = value else {
            return None;
        };

        let values = map
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) => Some((key, s)),
                serde_json::Value::Number(n) => Some((key, n.to_string())),
                _ => None,
            })
            .collect();

        Some(Self { values })
    }

    /// Get the published version for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fail with `Incomplete` unless every key is present and non-empty
    pub fn require(&self, keys: &[&str]) -> Result<(), ManifestError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| self.get(key).map_or(true, |v| v.trim().is_empty()))
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::incomplete(missing))
        }
    }

    /// Returns the number of usable keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no usable keys were found
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RemoteManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Client for remote version manifests
#[derive(Clone)]
pub struct ManifestClient {
    client: HttpClient,
}

impl ManifestClient {
    /// Create a new manifest client
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Single GET of a manifest; non-2xx status or undecodable JSON is an error
    pub async fn fetch_manifest(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<RemoteManifest, ManifestError> {
        let response = self
            .client
            .get(url, headers, timeout)
            .await
            .map_err(|f| f.into_manifest_error(url))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| RequestFailure::from_reqwest(&e).into_manifest_error(url))?;

        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ManifestError::invalid_json(url, e.to_string()))?;

        RemoteManifest::from_json(value)
            .ok_or_else(|| ManifestError::invalid_json(url, "expected a JSON object"))
    }

    /// Fetch a manifest, retrying transport failures per `policy`
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<RemoteManifest, ManifestError> {
        policy
            .run(
                move |attempt| {
                    tracing::debug!(url, attempt, "fetching manifest");
                    self.fetch_manifest(url, headers, timeout)
                },
                ManifestError::is_retryable,
            )
            .await
    }

    /// Fetch with retries, then require `keys`; missing keys are never retried
    pub async fn fetch_required(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
        policy: &RetryPolicy,
        keys: &[&str],
    ) -> Result<RemoteManifest, ManifestError> {
        let manifest = self.fetch_with_retry(url, headers, timeout, policy).await?;
        manifest.require(keys)?;
        Ok(manifest)
    }
}
