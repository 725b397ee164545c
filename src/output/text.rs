//! Text output formatter for human-readable display
//!
//! This module provides:
//! - One line per target with a status marker
//! - Semantic version change type indication (major/minor/patch/downgrade)
//! - Summary line with counters

use crate::domain::{TargetReport, UpdateOutcome, UpdateReport};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Kind of change between the previous and the installed version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChangeType {
    /// Major version change (breaking)
    Major,
    /// Minor version change (features)
    Minor,
    /// Patch version change (fixes)
    Patch,
    /// Remote version is older than the local one
    Downgrade,
    /// Either side is absent or not semver
    Unknown,
}

impl VersionChangeType {
    /// Determine the change type between two versions.
    ///
    /// Display only; whether to update is decided by raw string inequality.
    pub fn from_versions(old: Option<&str>, new: &str) -> Self {
        let parse = |v: &str| semver::Version::parse(v.trim().trim_start_matches('v')).ok();

        match (old.and_then(parse), parse(new)) {
            (Some(old), Some(new)) => {
                if new < old {
                    VersionChangeType::Downgrade
                } else if new.major != old.major {
                    VersionChangeType::Major
                } else if new.minor != old.minor {
                    VersionChangeType::Minor
                } else {
                    VersionChangeType::Patch
                }
            }
            _ => VersionChangeType::Unknown,
        }
    }

    /// Get the display label with color
    pub fn colored_label(&self) -> String {
        match self {
            VersionChangeType::Major => "major".red().bold().to_string(),
            VersionChangeType::Minor => "minor".yellow().to_string(),
            VersionChangeType::Patch => "patch".green().to_string(),
            VersionChangeType::Downgrade => "downgrade".magenta().bold().to_string(),
            VersionChangeType::Unknown => "?".dimmed().to_string(),
        }
    }

    /// Get the plain label
    pub fn label(&self) -> &'static str {
        match self {
            VersionChangeType::Major => "major",
            VersionChangeType::Minor => "minor",
            VersionChangeType::Patch => "patch",
            VersionChangeType::Downgrade => "downgrade",
            VersionChangeType::Unknown => "?",
        }
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether this is a dry-run
    dry_run: bool,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity, dry_run: bool) -> Self {
        Self::with_color(verbosity, dry_run, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, dry_run: bool, color: bool) -> Self {
        Self {
            verbosity,
            dry_run,
            color,
        }
    }

    /// Get the dry-run prefix if applicable
    fn dry_run_prefix(&self) -> String {
        match (self.dry_run, self.color) {
            (false, _) => String::new(),
            (true, true) => format!("{} ", "(dry-run)".cyan()),
            (true, false) => "(dry-run) ".to_string(),
        }
    }

    fn marker(&self, outcome: &UpdateOutcome) -> String {
        let (plain, painted) = match outcome {
            UpdateOutcome::UpToDate => ("=", "=".dimmed()),
            UpdateOutcome::Updated { .. } => ("✓", "✓".green().bold()),
            UpdateOutcome::UpdateAvailable { .. } => ("↑", "↑".yellow().bold()),
            _ => ("✗", "✗".red().bold()),
        };
        if self.color {
            painted.to_string()
        } else {
            plain.to_string()
        }
    }

    /// Version transition, e.g. `1.0.0 → 1.0.1 [patch]`
    fn transition(&self, from: Option<&str>, to: &str) -> String {
        let change = VersionChangeType::from_versions(from, to);
        let from = from.unwrap_or("absent");
        if self.color {
            format!(
                "{} {} {} [{}]",
                from.dimmed(),
                "→".dimmed(),
                to.bright_white().bold(),
                change.colored_label()
            )
        } else {
            format!("{} -> {} [{}]", from, to, change.label())
        }
    }

    fn detail(&self, target: &TargetReport) -> String {
        match &target.outcome {
            UpdateOutcome::UpToDate => {
                let current = target.previous.as_deref().unwrap_or("absent");
                if self.color {
                    format!("up to date ({})", current).dimmed().to_string()
                } else {
                    format!("up to date ({})", current)
                }
            }
            UpdateOutcome::Updated { version } => {
                format!("updated {}", self.transition(target.previous.as_deref(), version))
            }
            UpdateOutcome::UpdateAvailable { current, available } => {
                format!("available {}", self.transition(current.as_deref(), available))
            }
            failed => {
                if self.color {
                    failed.to_string().red().to_string()
                } else {
                    failed.to_string()
                }
            }
        }
    }

    fn format_target(
        &self,
        target: &TargetReport,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let name = format!("{:width$}", target.id, width = width);
        let name = if self.color {
            name.bold().to_string()
        } else {
            name
        };

        write!(
            writer,
            "  {} {} {}",
            self.marker(&target.outcome),
            name,
            self.detail(target)
        )?;
        if self.verbosity == Verbosity::Verbose {
            write!(writer, " ({} ms)", target.elapsed_ms)?;
        }
        writeln!(writer)
    }

    fn format_summary(&self, report: &UpdateReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let mut parts = vec![
            format!("{} updated", report.updated()),
            format!("{} up to date", report.up_to_date()),
        ];
        if report.check_only {
            parts.push(format!("{} available", report.available()));
        }
        parts.push(format!("{} failed", report.failed()));
        let line = parts.join(", ");

        if !self.color {
            return writeln!(writer, "{}{}", self.dry_run_prefix(), line);
        }
        let line = if report.has_failures() {
            line.red().to_string()
        } else {
            line.green().to_string()
        };
        writeln!(writer, "{}{}", self.dry_run_prefix(), line)
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &UpdateReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if report.targets.is_empty() {
            return writeln!(writer, "{}No targets selected.", self.dry_run_prefix());
        }

        let width = report
            .targets
            .iter()
            .map(|t| t.id.chars().count())
            .max()
            .unwrap_or(0);

        for target in &report.targets {
            if self.verbosity == Verbosity::Quiet && !target.outcome.is_failure() {
                continue;
            }
            self.format_target(target, width, writer)?;
        }

        self.format_summary(report, writer)
    }
}
