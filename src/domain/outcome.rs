//! Terminal result of one check-and-update cycle for one target

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-target result of an update cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Local version already matches the remote manifest
    UpToDate,
    /// A new archive was installed and the version file rewritten
    Updated { version: String },
    /// Check-only mode found a newer (or different) remote version
    UpdateAvailable {
        current: Option<String>,
        available: String,
    },
    /// Manifest could not be fetched or was incomplete
    CheckFailed { reason: String },
    /// Archive could not be downloaded; installation untouched
    DownloadFailed { reason: String },
    /// Archive could not be installed; previous installation kept
    InstallFailed { reason: String },
}

impl UpdateOutcome {
    /// Creates an Updated outcome
    pub fn updated(version: impl Into<String>) -> Self {
        UpdateOutcome::Updated {
            version: version.into(),
        }
    }

    /// Creates a CheckFailed outcome
    pub fn check_failed(reason: impl ToString) -> Self {
        UpdateOutcome::CheckFailed {
            reason: reason.to_string(),
        }
    }

    /// Creates a DownloadFailed outcome
    pub fn download_failed(reason: impl ToString) -> Self {
        UpdateOutcome::DownloadFailed {
            reason: reason.to_string(),
        }
    }

    /// Creates an InstallFailed outcome
    pub fn install_failed(reason: impl ToString) -> Self {
        UpdateOutcome::InstallFailed {
            reason: reason.to_string(),
        }
    }

    /// Returns true for any of the failure variants
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpdateOutcome::CheckFailed { .. }
                | UpdateOutcome::DownloadFailed { .. }
                | UpdateOutcome::InstallFailed { .. }
        )
    }

    /// Human-readable failure reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            UpdateOutcome::CheckFailed { reason }
            | UpdateOutcome::DownloadFailed { reason }
            | UpdateOutcome::InstallFailed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Short machine-friendly label
    pub fn label(&self) -> &'static str {
        match self {
            UpdateOutcome::UpToDate => "up_to_date",
            UpdateOutcome::Updated { .. } => "updated",
            UpdateOutcome::UpdateAvailable { .. } => "update_available",
            UpdateOutcome::CheckFailed { .. } => "check_failed",
            UpdateOutcome::DownloadFailed { .. } => "download_failed",
            UpdateOutcome::InstallFailed { .. } => "install_failed",
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::UpToDate => write!(f, "up to date"),
            UpdateOutcome::Updated { version } => write!(f, "updated to {}", version),
            UpdateOutcome::UpdateAvailable { current, available } => write!(
                f,
                "update available: {} → {}",
                current.as_deref().unwrap_or("absent"),
                available
            ),
            UpdateOutcome::CheckFailed { reason } => write!(f, "check failed: {}", reason),
            UpdateOutcome::DownloadFailed { reason } => write!(f, "download failed: {}", reason),
            UpdateOutcome::InstallFailed { reason } => write!(f, "install failed: {}", reason),
        }
    }
}
