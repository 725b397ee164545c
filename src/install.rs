//! Archive installation
//!
//! Installing never touches the previous tree until the new one has been
//! fully extracted and validated:
//!
//! 1. extract the zip into a scratch directory next to the target
//! 2. require exactly one top-level directory in the extracted tree
//! 3. move the old installation aside into the scratch directory
//! 4. rename the new root into place, moving the old tree back if that fails
//! 5. delete the scratch directory (and with it the old tree)
//!
//! The scratch directory lives in the target's parent so every rename stays
//! on one filesystem. The downloaded archive is removed on every exit path.

use crate::error::InstallError;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Prefix of per-invocation scratch directories
const SCRATCH_PREFIX: &str = ".upkeep-";

/// Replaces installation directories with the contents of zip archives
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    keep_failed_scratch: bool,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveInstaller {
    /// Create an installer that keeps scratch space after failures
    pub fn new() -> Self {
        Self {
            keep_failed_scratch: true,
        }
    }

    /// Set whether a failed install leaves its scratch directory behind
    pub fn keep_failed_scratch(mut self, keep: bool) -> Self {
        self.keep_failed_scratch = keep;
        self
    }

    /// Install `archive` as the new contents of `target_dir`.
    ///
    /// On error the previous installation is intact, unless the error is
    /// [`InstallError::Swap`] and rollback also failed, in which case the old
    /// tree is left in the kept scratch directory and logged.
    pub fn install(&self, archive: &Path, target_dir: &Path) -> Result<(), InstallError> {
        let parent = parent_dir(target_dir);
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| InstallError::io(parent, e))?;

        let result = install_in(archive, target_dir, scratch.path());
        remove_archive(archive);

        match &result {
            Ok(()) => {
                let path = scratch.path().to_path_buf();
                if let Err(e) = scratch.close() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
                }
                tracing::info!(path = %target_dir.display(), "installation replaced");
            }
            Err(e) if self.keep_failed_scratch || matches!(e, InstallError::Swap { .. }) => {
                let kept = scratch.keep();
                tracing::warn!(path = %kept.display(), error = %e, "install failed, scratch kept");
            }
            Err(e) => {
                tracing::warn!(path = %target_dir.display(), error = %e, "install failed");
            }
        }

        result
    }
}

fn install_in(archive: &Path, target_dir: &Path, scratch: &Path) -> Result<(), InstallError> {
    let extract_dir = scratch.join("extract");
    extract_zip(archive, &extract_dir)?;

    let root = single_root(&extract_dir)?;
    tracing::debug!(root = %root.display(), "archive root located");

    swap_into_place(&root, target_dir, &scratch.join("previous"))
}

/// Extract every entry of a zip archive below `dest`
fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), InstallError> {
    let file = fs::File::open(archive_path).map_err(|e| InstallError::OpenArchive {
        path: archive_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| InstallError::OpenArchive {
        path: archive_path.to_path_buf(),
        message: e.to_string(),
    })?;

    fs::create_dir_all(dest).map_err(|e| InstallError::io(dest, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| InstallError::Extract {
            entry: format!("#{i}"),
            message: e.to_string(),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(InstallError::Extract {
                entry: entry.name().to_string(),
                message: "path escapes the extraction directory".to_string(),
            });
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| InstallError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
        }
        let mut out = fs::File::create(&out_path).map_err(|e| InstallError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| InstallError::Extract {
            entry: entry.name().to_string(),
            message: e.to_string(),
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                .map_err(|e| InstallError::io(&out_path, e))?;
        }
    }

    Ok(())
}

/// The single top-level directory of an extracted tree
fn single_root(extract_dir: &Path) -> Result<PathBuf, InstallError> {
    let entries = fs::read_dir(extract_dir)
        .map_err(|e| InstallError::io(extract_dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| InstallError::io(extract_dir, e))?;

    match entries.as_slice() {
        [] => Err(InstallError::malformed("archive is empty")),
        [entry] => {
            let file_type = entry
                .file_type()
                .map_err(|e| InstallError::io(entry.path(), e))?;
            if file_type.is_dir() {
                Ok(entry.path())
            } else {
                Err(InstallError::malformed(format!(
                    "top-level entry '{}' is not a directory",
                    entry.file_name().to_string_lossy()
                )))
            }
        }
        many => Err(InstallError::malformed(format!(
            "expected a single top-level directory, found {} entries",
            many.len()
        ))),
    }
}

/// Move `new_root` to `target_dir`, parking any existing tree at `previous`
fn swap_into_place(new_root: &Path, target_dir: &Path, previous: &Path) -> Result<(), InstallError> {
    let had_previous = match fs::symlink_metadata(target_dir) {
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(InstallError::io(target_dir, e)),
    };

    if had_previous {
        fs::rename(target_dir, previous).map_err(|source| InstallError::Swap {
            from: target_dir.to_path_buf(),
            to: previous.to_path_buf(),
            source,
        })?;
    }

    if let Err(source) = fs::rename(new_root, target_dir) {
        if had_previous {
            if let Err(e) = fs::rename(previous, target_dir) {
                tracing::error!(
                    previous = %previous.display(),
                    path = %target_dir.display(),
                    error = %e,
                    "rollback failed, previous installation left in scratch"
                );
            }
        }
        return Err(InstallError::Swap {
            from: new_root.to_path_buf(),
            to: target_dir.to_path_buf(),
            source,
        });
    }

    Ok(())
}

fn remove_archive(archive: &Path) {
    match fs::remove_file(archive) {
        Ok(()) => tracing::debug!(path = %archive.display(), "archive removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %archive.display(), error = %e, "failed to remove archive"),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
