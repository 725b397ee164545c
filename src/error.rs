//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ManifestError: Issues fetching or validating the remote version manifest
//! - DownloadError: Issues streaming an archive to disk
//! - InstallError: Issues extracting and swapping an archive into place
//! - VersionError: Issues with local version files
//! - ConfigError: Issues with the TOML configuration

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Remote manifest related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Archive download related errors
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Archive installation related errors
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Local version file related errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while fetching or validating a remote manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Connection-level failure
    #[error("failed to reach {url}: {message}")]
    Network { url: String, message: String },

    /// Request exceeded its timeout
    #[error("timeout while fetching {url}")]
    Timeout { url: String },

    /// Server answered with a non-success status
    #[error("unexpected HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Body was not a JSON object
    #[error("invalid manifest from {url}: {message}")]
    InvalidJson { url: String, message: String },

    /// Manifest lacks keys the target requires
    #[error("server data incomplete (missing: {})", .missing.join(", "))]
    Incomplete { missing: Vec<String> },
}

/// Errors raised while downloading an archive
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Connection-level failure
    #[error("failed to download {url}: {message}")]
    Network { url: String, message: String },

    /// Request exceeded its timeout
    #[error("timeout while downloading {url}")]
    Timeout { url: String },

    /// Server answered with a non-success status
    #[error("unexpected HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Transfer finished but produced no bytes
    #[error("downloaded file is empty: {path}")]
    Empty { path: PathBuf },

    /// Fewer bytes arrived than Content-Length announced
    #[error("truncated transfer: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Local file operation failed
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while installing an archive
#[derive(Error, Debug)]
pub enum InstallError {
    /// Archive could not be opened or is not a zip file
    #[error("cannot open archive {path}: {message}")]
    OpenArchive { path: PathBuf, message: String },

    /// An entry could not be extracted
    #[error("failed to extract {entry}: {message}")]
    Extract { entry: String, message: String },

    /// Archive does not contain exactly one root directory
    #[error("malformed archive: {reason}")]
    MalformedArchive { reason: String },

    /// Local file operation failed
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving the new tree into place failed; the previous tree was restored
    #[error("failed to move {from} into {to}: {source}")]
    Swap {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Installation succeeded but the new version could not be recorded
    #[error("installed but failed to record version: {0}")]
    RecordVersion(#[source] VersionError),
}

/// Errors related to local version files
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to read version file
    #[error("failed to read version file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write version file
    #[error("failed to write version file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Major segment is already at its maximum
    #[error("cannot bump {version} in {path}: major version overflow")]
    Overflow { path: PathBuf, version: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse TOML in {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// Semantically invalid configuration
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    /// Two targets share an id
    #[error("duplicate target id '{id}'")]
    DuplicateTarget { id: String },

    /// One target's install_dir equals or contains another's
    #[error("targets '{first}' and '{second}' have overlapping install_dir")]
    OverlappingInstallDirs { first: String, second: String },

    /// --only names a target that is not configured
    #[error("unknown target '{id}'")]
    UnknownTarget { id: String },

    /// HTTP client could not be built
    #[error("failed to create HTTP client: {message}")]
    HttpClient { message: String },
}

impl ManifestError {
    /// Creates a new Network error
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        ManifestError::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidJson error
    pub fn invalid_json(url: impl Into<String>, message: impl Into<String>) -> Self {
        ManifestError::InvalidJson {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new Incomplete error
    pub fn incomplete(missing: Vec<String>) -> Self {
        ManifestError::Incomplete { missing }
    }

    /// Returns true for transport failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ManifestError::Network { .. }
                | ManifestError::Timeout { .. }
                | ManifestError::HttpStatus { .. }
        )
    }
}

impl DownloadError {
    /// Creates a new Io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.into(),
            source,
        }
    }
}

impl InstallError {
    /// Creates a new MalformedArchive error
    pub fn malformed(reason: impl Into<String>) -> Self {
        InstallError::MalformedArchive {
            reason: reason.into(),
        }
    }

    /// Creates a new Io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }
}

impl VersionError {
    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VersionError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VersionError::WriteError {
            path: path.into(),
            source,
        }
    }
}

impl ConfigError {
    /// Creates a new Invalid error
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error_incomplete_message() {
        let err = ManifestError::incomplete(vec![
            "version_python".to_string(),
            "version_interface".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("server data incomplete"));
        assert!(msg.contains("version_python, version_interface"));
    }

    #[test]
    fn test_manifest_error_retryable() {
        assert!(ManifestError::network("http://x", "refused").is_retryable());
        assert!(ManifestError::Timeout {
            url: "http://x".to_string()
        }
        .is_retryable());
        assert!(ManifestError::HttpStatus {
            url: "http://x".to_string(),
            status: 503
        }
        .is_retryable());
        assert!(!ManifestError::invalid_json("http://x", "eof").is_retryable());
        assert!(!ManifestError::incomplete(vec!["k".to_string()]).is_retryable());
    }

    #[test]
    fn test_download_error_truncated() {
        let err = DownloadError::Truncated {
            expected: 100,
            actual: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("truncated"));
        assert!(msg.contains("100"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_install_error_malformed() {
        let err = InstallError::malformed("archive is empty");
        assert_eq!(err.to_string(), "malformed archive: archive is empty");
    }

    #[test]
    fn test_install_error_record_version_chains_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = InstallError::RecordVersion(VersionError::write_error("/v.txt", io));
        let msg = err.to_string();
        assert!(msg.contains("installed but failed to record version"));
        assert!(msg.contains("v.txt"));
    }

    #[test]
    fn test_version_error_overflow() {
        let err = VersionError::Overflow {
            path: PathBuf::from("/v.txt"),
            version: "4294967295.9.9".to_string(),
        };
        assert!(err.to_string().contains("major version overflow"));
    }

    #[test]
    fn test_config_error_duplicate_target() {
        let err = ConfigError::DuplicateTarget {
            id: "python".to_string(),
        };
        assert!(err.to_string().contains("duplicate target id 'python'"));
    }

    #[test]
    fn test_app_error_from_manifest_error() {
        let app_err: AppError = ManifestError::incomplete(vec!["k".to_string()]).into();
        assert!(app_err.to_string().contains("server data incomplete"));
    }

    #[test]
    fn test_app_error_from_config_error() {
        let app_err: AppError = ConfigError::invalid("no targets").into();
        assert!(app_err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_error_debug_trait() {
        let err = InstallError::malformed("x");
        let debug = format!("{:?}", err);
        assert!(debug.contains("MalformedArchive"));
    }
}
