//! Remote side of an update cycle
//!
//! This module provides:
//! - HTTP client shared foundation with failure classification
//! - Injectable retry policy (fixed or exponential backoff)
//! - Remote version manifest client
//! - Streaming archive fetcher

mod client;
mod fetcher;
mod manifest;
mod retry;

pub use client::{HttpClient, RequestFailure};
pub use fetcher::{ArchiveFetcher, ProgressFn};
pub use manifest::{ManifestClient, RemoteManifest};
pub use retry::{Backoff, RetryPolicy};
