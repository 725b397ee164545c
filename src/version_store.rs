//! Local version files
//!
//! This module provides:
//! - Reading a component's plain-text version file (absent or unparseable → `None`)
//! - Reading the `"version"` field of an extension's local manifest
//! - Crash-safe version writes (temp file in the same directory, then rename)
//! - The release-time odometer bump applied to a version file

use crate::domain::VersionRecord;
use crate::error::VersionError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Read a version file.
///
/// Returns `None` when the file is missing, unreadable or does not hold a
/// `major.minor.patch` triple; callers treat that as "update required".
pub fn read(path: &Path) -> Option<VersionRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "version file absent");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "version file unreadable");
            return None;
        }
    };

    match content.parse() {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "version file unparseable");
            None
        }
    }
}

/// Read a version file's trimmed text without parsing it.
///
/// This is what update decisions compare against the remote value, so a
/// verbatim non-triple version written by an earlier install still counts
/// as current. Missing, unreadable or blank files yield `None`.
pub fn read_raw(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "version file unreadable");
            }
            None
        }
    }
}

/// Read the `"version"` field of a local JSON manifest.
///
/// String and numeric values are returned as strings; a missing file,
/// invalid JSON or a missing field yields `None`.
pub fn read_manifest_version(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "local manifest is not valid JSON");
            return None;
        }
    };

    match value.get("version")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Overwrite a version file with `version`.
///
/// The content goes to a temporary sibling that is flushed and renamed over
/// the destination, so an interrupted write never leaves a truncated file.
pub fn write(path: &Path, version: &str) -> Result<(), VersionError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| VersionError::write_error(path, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| VersionError::write_error(path, e))?;
    tmp.write_all(version.as_bytes())
        .map_err(|e| VersionError::write_error(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| VersionError::write_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| VersionError::write_error(path, e.error))?;

    tracing::debug!(path = %path.display(), version, "version file written");
    Ok(())
}

/// Bump the version stored in `path` and persist the result.
///
/// Missing, empty or malformed content is treated as `1.0.0` before bumping.
/// Returns `(new, old)`.
pub fn bump_file(path: &Path) -> Result<(VersionRecord, VersionRecord), VersionError> {
    let (new, old) = plan_bump(path)?;
    write(path, &new.to_string())?;
    Ok((new, old))
}

/// Compute what [`bump_file`] would write, returning `(new, old)`
pub fn plan_bump(path: &Path) -> Result<(VersionRecord, VersionRecord), VersionError> {
    let old = current_or_initial(path)?;
    let new = old.bump().ok_or_else(|| VersionError::Overflow {
        path: path.to_path_buf(),
        version: old.to_string(),
    })?;
    Ok((new, old))
}

/// Version a bump would start from, without writing anything
pub fn current_or_initial(path: &Path) -> Result<VersionRecord, VersionError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(VersionRecord::parse_or_initial(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(VersionRecord::INITIAL),
        Err(e) => Err(VersionError::read_error(path, e)),
    }
}
