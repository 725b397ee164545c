//! Core domain models for upkeep
//!
//! This module contains the fundamental types used throughout the application:
//! - Version records and the odometer bump
//! - Update target descriptions
//! - Per-target outcomes and the aggregated report
//! - Progress events

mod event;
mod outcome;
mod report;
mod target;
mod version;

pub use event::{EventSink, Stage, UpdateEvent};
pub use outcome::UpdateOutcome;
pub use report::{TargetReport, UpdateReport};
pub use target::{LocalManifest, TrackedVersion, UpdateTarget};
pub use version::{ParseVersionError, VersionRecord};
