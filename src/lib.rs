//! upkeep - version negotiation and self-update library
//!
//! This library keeps independently versioned components current:
//! - Local version files and the release-time odometer bump
//! - Remote version manifests fetched with a retry policy
//! - Streaming archive downloads
//! - Crash-safe directory swaps from zip archives
//! - An orchestrator running the per-target pipeline with bounded concurrency

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod install;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod remote;
pub mod version_store;
