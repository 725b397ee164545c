//! TOML configuration
//!
//! ```toml
//! concurrency = 2
//! keep_failed_scratch = true
//!
//! [retry]
//! max_attempts = 3
//! delay_ms = 3000
//! backoff = "fixed"
//!
//! [timeouts]
//! manifest_secs = 15
//! download_idle_secs = 60
//!
//! [[target]]
//! id = "python"
//! install_dir = "Programme-main"
//! version_file = "Programme-main/Python/version.txt"
//! version_key = "version_python"
//! manifest_url = "https://example.com/version.json"
//! archive_url = "https://example.com/main.zip"
//! extra_versions = [
//!     { key = "version_interface", file = "Programme-main/interface/version.txt" },
//! ]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::domain::{TrackedVersion, UpdateTarget};
use crate::error::ConfigError;
use crate::orchestrator::{OrchestratorConfig, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::remote::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "upkeep.toml";

/// Request timeouts (`[timeouts]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Seconds allowed for each manifest request
    pub manifest_secs: u64,
    /// Seconds a download may go without receiving data
    pub download_idle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            manifest_secs: 15,
            download_idle_secs: 60,
        }
    }
}

/// One `[[target]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub id: String,
    pub install_dir: PathBuf,
    pub version_file: PathBuf,
    pub version_key: String,
    #[serde(default)]
    pub extra_versions: Vec<TrackedVersion>,
    pub manifest_url: String,
    pub archive_url: String,
    #[serde(default)]
    pub manifest_file: Option<PathBuf>,
    #[serde(default)]
    pub manifest_key: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl TargetConfig {
    fn to_target(&self) -> UpdateTarget {
        let mut target = UpdateTarget::new(
            &self.id,
            &self.install_dir,
            &self.version_file,
            &self.version_key,
            &self.manifest_url,
            &self.archive_url,
        );
        for tracked in &self.extra_versions {
            target = target.with_extra_version(&tracked.key, &tracked.file);
        }
        if let (Some(file), Some(key)) = (&self.manifest_file, &self.manifest_key) {
            target = target.with_local_manifest(file, key);
        }
        for (name, value) in &self.headers {
            target = target.with_header(name, value);
        }
        target
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.install_dir = base.join(&self.install_dir);
        self.version_file = base.join(&self.version_file);
        for tracked in &mut self.extra_versions {
            tracked.file = base.join(&tracked.file);
        }
        if let Some(file) = &self.manifest_file {
            self.manifest_file = Some(base.join(file));
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Targets processed at once (1..=8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Keep extraction scratch after a failed install
    #[serde(default = "default_keep_failed_scratch")]
    pub keep_failed_scratch: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_keep_failed_scratch() -> bool {
    true
}

impl Config {
    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, path)?;
        tracing::debug!(path = %path.display(), targets = config.targets.len(), "config loaded");
        Ok(config)
    }

    /// Parse TOML read from `source`, resolve relative paths against
    /// `source`'s directory, then validate
    pub fn parse(content: &str, source: &Path) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

        let base = match source.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        for target in &mut config.targets {
            target.resolve_paths(base);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without touching the network
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::invalid(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::invalid("no [[target]] entries"));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                return Err(ConfigError::invalid("target id must not be empty"));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::DuplicateTarget {
                    id: target.id.clone(),
                });
            }
            if target.version_key.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "target '{}': version_key must not be empty",
                    target.id
                )));
            }
            if target.manifest_file.is_some() != target.manifest_key.is_some() {
                return Err(ConfigError::invalid(format!(
                    "target '{}': manifest_file and manifest_key must be given together",
                    target.id
                )));
            }
            if target.extra_versions.iter().any(|t| t.key.trim().is_empty()) {
                return Err(ConfigError::invalid(format!(
                    "target '{}': extra_versions keys must not be empty",
                    target.id
                )));
            }
            check_url(&target.id, "manifest_url", &target.manifest_url)?;
            check_url(&target.id, "archive_url", &target.archive_url)?;
        }

        // Each install replaces its whole directory, so no two may nest
        for (i, first) in self.targets.iter().enumerate() {
            for second in &self.targets[i + 1..] {
                if first.install_dir.starts_with(&second.install_dir)
                    || second.install_dir.starts_with(&first.install_dir)
                {
                    return Err(ConfigError::OverlappingInstallDirs {
                        first: first.id.clone(),
                        second: second.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Orchestrator settings derived from this file
    pub fn orchestrator_config(&self, check_only: bool) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency: self.concurrency,
            retry: self.retry.clone(),
            manifest_timeout: Duration::from_secs(self.timeouts.manifest_secs),
            download_idle_timeout: Duration::from_secs(self.timeouts.download_idle_secs),
            check_only,
            keep_failed_scratch: self.keep_failed_scratch,
        }
    }

    /// All configured targets, in file order
    pub fn targets(&self) -> Vec<UpdateTarget> {
        self.targets.iter().map(TargetConfig::to_target).collect()
    }

    /// Targets named in `only` (all of them when `only` is empty), in file order
    pub fn select(&self, only: &[String]) -> Result<Vec<UpdateTarget>, ConfigError> {
        if let Some(unknown) = only
            .iter()
            .find(|id| !self.targets.iter().any(|t| &t.id == *id))
        {
            return Err(ConfigError::UnknownTarget {
                id: unknown.clone(),
            });
        }

        Ok(self
            .targets
            .iter()
            .filter(|t| only.is_empty() || only.contains(&t.id))
            .map(TargetConfig::to_target)
            .collect())
    }
}

fn check_url(id: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::invalid(format!(
            "target '{id}': {field} must use http or https, got '{}'",
            url.scheme()
        ))),
        Err(e) => Err(ConfigError::invalid(format!(
            "target '{id}': {field} is not a valid URL: {e}"
        ))),
    }
}
