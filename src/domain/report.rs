//! Update report types
//!
//! Collects per-target outcomes of one `check_and_update` call.

use super::UpdateOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single target together with what was installed before
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    /// Target identifier
    pub id: String,
    /// Local version before the cycle, `None` when absent or unreadable
    pub previous: Option<String>,
    /// Terminal outcome
    pub outcome: UpdateOutcome,
    /// Wall-clock time spent on this target
    pub elapsed_ms: u64,
}

impl TargetReport {
    /// Creates a new TargetReport
    pub fn new(id: impl Into<String>, previous: Option<String>, outcome: UpdateOutcome) -> Self {
        Self {
            id: id.into(),
            previous,
            outcome,
            elapsed_ms: 0,
        }
    }

    /// Sets the elapsed time
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }
}

/// Overall result of one update cycle, in target input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Whether the cycle stopped after the check stage
    pub check_only: bool,
    /// One entry per target
    pub targets: Vec<TargetReport>,
}

impl UpdateReport {
    /// Creates an empty report starting now
    pub fn new(check_only: bool) -> Self {
        Self {
            started_at: Utc::now(),
            check_only,
            targets: Vec::new(),
        }
    }

    /// Adds a target result
    pub fn add_target(&mut self, report: TargetReport) {
        self.targets.push(report);
    }

    /// Looks up the outcome for a target id
    pub fn outcome(&self, id: &str) -> Option<&UpdateOutcome> {
        self.targets.iter().find(|t| t.id == id).map(|t| &t.outcome)
    }

    /// Returns the number of targets that installed a new version
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Updated { .. }))
    }

    /// Returns the number of targets already current
    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::UpToDate))
    }

    /// Returns the number of targets with an update pending (check-only mode)
    pub fn available(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::UpdateAvailable { .. }))
    }

    /// Returns the number of failed targets
    pub fn failed(&self) -> usize {
        self.count(UpdateOutcome::is_failure)
    }

    /// Returns true if any target failed
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Returns all failed targets
    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| t.outcome.is_failure())
    }

    fn count(&self, predicate: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.targets.iter().filter(|t| predicate(&t.outcome)).count()
    }
}
