//! Structured progress events emitted during an update cycle
//!
//! Callers (CLI, GUI) subscribe through an [`EventSink`] and render these
//! however they like; the library itself never prints.

use super::UpdateOutcome;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage of a single target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Checking,
    Downloading,
    Installing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Checking => "checking",
            Stage::Downloading => "downloading",
            Stage::Installing => "installing",
        };
        f.write_str(name)
    }
}

/// Event emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// Target entered a new stage
    StageChanged { target: String, stage: Stage },
    /// Archive bytes written so far; `total` comes from Content-Length when known
    DownloadProgress {
        target: String,
        downloaded: u64,
        total: Option<u64>,
    },
    /// Target reached a terminal outcome
    Finished {
        target: String,
        outcome: UpdateOutcome,
    },
}

impl UpdateEvent {
    /// Returns the target id this event belongs to
    pub fn target(&self) -> &str {
        match self {
            UpdateEvent::StageChanged { target, .. }
            | UpdateEvent::DownloadProgress { target, .. }
            | UpdateEvent::Finished { target, .. } => target,
        }
    }
}

/// Callback receiving update events; shared across concurrently running targets
pub type EventSink = Arc<dyn Fn(UpdateEvent) + Send + Sync>;
