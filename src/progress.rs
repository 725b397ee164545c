//! Progress display for update cycles
//!
//! Renders orchestrator events with indicatif: one line per target in a
//! shared `MultiProgress`, turning into a byte counter while downloading.

use crate::domain::{EventSink, Stage, UpdateEvent};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {prefix:.bold} {msg}";
const BYTES_TEMPLATE: &str =
    "{spinner:.cyan} {prefix:.bold} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Progress reporter fed by [`UpdateEvent`]s
pub struct Progress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl Progress {
    /// Create a progress reporter drawing to stderr, or nothing when disabled
    pub fn new(enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Create a disabled progress reporter
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Wrap this reporter as an orchestrator event sink
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let progress = Arc::clone(self);
        Arc::new(move |event: UpdateEvent| progress.handle(&event))
    }

    /// Number of targets currently displayed
    pub fn active(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }

    /// Apply one event to the display
    pub fn handle(&self, event: &UpdateEvent) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());

        let target = event.target();

        match event {
            UpdateEvent::StageChanged { stage, .. } => {
                let bar = bars
                    .entry(target.to_string())
                    .or_insert_with(|| self.spinner(target));
                if *stage == Stage::Installing {
                    bar.set_style(spinner_style());
                }
                bar.set_message(stage.to_string());
            }
            UpdateEvent::DownloadProgress {
                downloaded, total, ..
            } => {
                let bar = bars
                    .entry(target.to_string())
                    .or_insert_with(|| self.spinner(target));
                if let Some(total) = total {
                    if bar.length() != Some(*total) {
                        bar.set_length(*total);
                        bar.set_style(bytes_style());
                    }
                }
                bar.set_position(*downloaded);
            }
            UpdateEvent::Finished { outcome, .. } => {
                if let Some(bar) = bars.remove(target) {
                    bar.set_style(spinner_style());
                    bar.finish_with_message(outcome.to_string());
                }
            }
        }
    }

    fn spinner(&self, target: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_prefix(target.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(true)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BYTES_TEMPLATE)
        .map(|style| style.progress_chars("█▓▒░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
