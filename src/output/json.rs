//! JSON output formatter for machine processing

use crate::domain::{TargetReport, UpdateReport};
use crate::output::OutputFormatter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON representation of the full report
#[derive(Serialize)]
struct JsonOutput<'a> {
    started_at: DateTime<Utc>,
    check_only: bool,
    summary: JsonSummary,
    targets: &'a [TargetReport],
}

/// Outcome counters
#[derive(Serialize)]
struct JsonSummary {
    updated: usize,
    up_to_date: usize,
    available: usize,
    failed: usize,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &UpdateReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = JsonOutput {
            started_at: report.started_at,
            check_only: report.check_only,
            summary: JsonSummary {
                updated: report.updated(),
                up_to_date: report.up_to_date(),
                available: report.available(),
                failed: report.failed(),
            },
            targets: &report.targets,
        };

        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)
    }
}
