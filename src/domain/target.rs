//! Description of one independently installable component

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Local structured manifest carried by extension-style targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalManifest {
    /// Path to the local manifest JSON file
    pub path: PathBuf,
    /// Remote manifest key compared against the local `"version"` field
    pub remote_key: String,
}

/// A further version file shipped inside the same archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedVersion {
    /// Remote manifest key holding the published version
    pub key: String,
    /// Plain-text version file rewritten after every install
    pub file: PathBuf,
}

/// One manageable unit: where it lives locally and where its updates come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateTarget {
    /// Unique identifier, also the key for per-target locking
    pub id: String,
    /// Installation directory replaced wholesale on update
    pub install_dir: PathBuf,
    /// Plain-text version file
    pub version_file: PathBuf,
    /// Remote manifest key holding this component's published version
    pub version_key: String,
    /// Other components bundled in the same archive, each with its own key
    /// and version file; any mismatch makes the whole target stale
    pub extra_versions: Vec<TrackedVersion>,
    /// Optional structured manifest compared in addition to the version file
    pub local_manifest: Option<LocalManifest>,
    /// URL of the remote version manifest
    pub manifest_url: String,
    /// URL of the full replacement archive
    pub archive_url: String,
    /// Extra request headers sent with both requests
    pub headers: BTreeMap<String, String>,
}

impl UpdateTarget {
    /// Creates a target tracking only a version file
    pub fn new(
        id: impl Into<String>,
        install_dir: impl Into<PathBuf>,
        version_file: impl Into<PathBuf>,
        version_key: impl Into<String>,
        manifest_url: impl Into<String>,
        archive_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            install_dir: install_dir.into(),
            version_file: version_file.into(),
            version_key: version_key.into(),
            extra_versions: Vec::new(),
            local_manifest: None,
            manifest_url: manifest_url.into(),
            archive_url: archive_url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Also compare a local manifest's `"version"` against `remote_key`
    pub fn with_local_manifest(
        mut self,
        path: impl Into<PathBuf>,
        remote_key: impl Into<String>,
    ) -> Self {
        self.local_manifest = Some(LocalManifest {
            path: path.into(),
            remote_key: remote_key.into(),
        });
        self
    }

    /// Also track `key` against the version file at `file`
    pub fn with_extra_version(mut self, key: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        self.extra_versions.push(TrackedVersion {
            key: key.into(),
            file: file.into(),
        });
        self
    }

    /// Every `(manifest key, version file)` pair, primary first
    pub fn tracked_versions(&self) -> impl Iterator<Item = (&str, &Path)> {
        std::iter::once((self.version_key.as_str(), self.version_file.as_path())).chain(
            self.extra_versions
                .iter()
                .map(|tracked| (tracked.key.as_str(), tracked.file.as_path())),
        )
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Remote manifest keys this target cannot be decided without
    pub fn required_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.tracked_versions().map(|(key, _)| key).collect();
        if let Some(manifest) = &self.local_manifest {
            keys.push(manifest.remote_key.as_str());
        }
        keys
    }
}
