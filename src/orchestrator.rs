//! Update orchestrator for coordinating the check → download → install cycle
//!
//! This module provides:
//! - Per-target pipeline: read local version → fetch manifest → download → install → record
//! - Bounded concurrency across targets
//! - Per-target locking so two cycles never touch the same installation at once
//! - Check-only mode
//! - Failure isolation: every failure becomes that target's outcome

use crate::domain::{
    EventSink, Stage, TargetReport, UpdateEvent, UpdateOutcome, UpdateReport, UpdateTarget,
};
use crate::error::{ConfigError, DownloadError, InstallError, VersionError};
use crate::install::ArchiveInstaller;
use crate::remote::{ArchiveFetcher, HttpClient, ManifestClient, RemoteManifest, RetryPolicy};
use crate::version_store;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Default number of targets processed at once
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Upper bound accepted for `concurrency`
pub const MAX_CONCURRENCY: usize = 8;

/// Default timeout for a single manifest request
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default longest silence tolerated during an archive download
pub const DEFAULT_DOWNLOAD_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of targets processed concurrently
    pub concurrency: usize,
    /// Retry policy for manifest fetches
    pub retry: RetryPolicy,
    /// Timeout for each manifest request
    pub manifest_timeout: Duration,
    /// Longest silence tolerated while an archive downloads
    pub download_idle_timeout: Duration,
    /// Stop after the check stage and report `UpdateAvailable`
    pub check_only: bool,
    /// Keep extraction scratch space after a failed install
    pub keep_failed_scratch: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
            download_idle_timeout: DEFAULT_DOWNLOAD_IDLE_TIMEOUT,
            check_only: false,
            keep_failed_scratch: true,
        }
    }
}

/// One async mutex per target id
#[derive(Default)]
struct TargetLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TargetLocks {
    fn get(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.to_string()).or_default().clone()
    }
}

/// Orchestrator for coordinating update cycles
pub struct Orchestrator {
    manifests: ManifestClient,
    fetcher: ArchiveFetcher,
    installer: ArchiveInstaller,
    config: OrchestratorConfig,
    /// Bounds how many targets run at once
    semaphore: Arc<Semaphore>,
    /// Serializes cycles on the same target
    locks: TargetLocks,
    events: Option<EventSink>,
}

impl Orchestrator {
    /// Create a new orchestrator with a default HTTP client
    pub fn new(config: OrchestratorConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_client(config, HttpClient::new()?))
    }

    /// Create an orchestrator with a custom HTTP client
    pub fn with_client(config: OrchestratorConfig, client: HttpClient) -> Self {
        let concurrency = config.concurrency.clamp(1, MAX_CONCURRENCY);
        Self {
            manifests: ManifestClient::new(client.clone()),
            fetcher: ArchiveFetcher::new(client),
            installer: ArchiveInstaller::new().keep_failed_scratch(config.keep_failed_scratch),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            locks: TargetLocks::default(),
            events: None,
            config,
        }
    }

    /// Deliver progress events to `sink`
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Returns the active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one update cycle over `targets`.
    ///
    /// Targets run independently; the report lists them in input order and
    /// always has exactly one entry per target.
    pub async fn check_and_update(&self, targets: &[UpdateTarget]) -> UpdateReport {
        let mut report = UpdateReport::new(self.config.check_only);
        tracing::info!(
            targets = targets.len(),
            check_only = self.config.check_only,
            "update cycle started"
        );

        let runs = targets.iter().map(|target| {
            let span = tracing::info_span!("target", id = %target.id);
            self.run_target(target).instrument(span)
        });
        for target_report in join_all(runs).await {
            report.add_target(target_report);
        }

        tracing::info!(
            updated = report.updated(),
            up_to_date = report.up_to_date(),
            failed = report.failed(),
            "update cycle finished"
        );
        report
    }

    async fn run_target(&self, target: &UpdateTarget) -> TargetReport {
        // Lock before taking a permit so a waiting duplicate never holds one
        let lock = self.locks.get(&target.id);
        let _guard = lock.lock().await;
        let _permit = self.semaphore.acquire().await.ok();

        let started = Instant::now();
        let previous = version_store::read_raw(&target.version_file);
        let outcome = self.pipeline(target, previous.as_deref()).await;

        match &outcome {
            o if o.is_failure() => tracing::warn!(outcome = %o, "target failed"),
            o => tracing::info!(outcome = %o, "target finished"),
        }
        self.emit(UpdateEvent::Finished {
            target: target.id.clone(),
            outcome: outcome.clone(),
        });

        TargetReport::new(&target.id, previous, outcome)
            .with_elapsed_ms(started.elapsed().as_millis() as u64)
    }

    async fn pipeline(&self, target: &UpdateTarget, previous: Option<&str>) -> UpdateOutcome {
        self.emit_stage(target, Stage::Checking);
        let manifest = match self
            .manifests
            .fetch_required(
                &target.manifest_url,
                &target.headers,
                self.config.manifest_timeout,
                &self.config.retry,
                &target.required_keys(),
            )
            .await
        {
            Ok(manifest) => manifest,
            Err(e) => return UpdateOutcome::check_failed(e),
        };

        // Present after fetch_required
        let available = manifest.get(&target.version_key).unwrap_or_default();

        if !needs_update(target, previous, &manifest) {
            return UpdateOutcome::UpToDate;
        }
        tracing::info!(current = previous, available, "update required");

        if self.config.check_only {
            return UpdateOutcome::UpdateAvailable {
                current: previous.map(str::to_string),
                available: available.to_string(),
            };
        }

        self.emit_stage(target, Stage::Downloading);
        let download_dir = match tempfile::Builder::new().prefix("upkeep-dl-").tempdir() {
            Ok(dir) => dir,
            Err(e) => return UpdateOutcome::download_failed(DownloadError::io(std::env::temp_dir(), e)),
        };
        let archive = download_dir.path().join(archive_file_name(&target.id));

        let on_progress = |downloaded: u64, total: Option<u64>| {
            self.emit(UpdateEvent::DownloadProgress {
                target: target.id.clone(),
                downloaded,
                total,
            })
        };
        if let Err(e) = self
            .fetcher
            .download(
                &target.archive_url,
                &archive,
                &target.headers,
                self.config.download_idle_timeout,
                &on_progress,
            )
            .await
        {
            return UpdateOutcome::download_failed(e);
        }

        self.emit_stage(target, Stage::Installing);
        let installer = self.installer.clone();
        let install_dir = target.install_dir.clone();
        let installed =
            tokio::task::spawn_blocking(move || installer.install(&archive, &install_dir)).await;
        match installed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return UpdateOutcome::install_failed(e),
            Err(e) => {
                let err = InstallError::io(&target.install_dir, std::io::Error::other(e.to_string()));
                return UpdateOutcome::install_failed(err);
            }
        }

        if let Err(e) = record_versions(target, &manifest) {
            return UpdateOutcome::install_failed(InstallError::RecordVersion(e));
        }

        UpdateOutcome::updated(available)
    }

    fn emit(&self, event: UpdateEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    fn emit_stage(&self, target: &UpdateTarget, stage: Stage) {
        tracing::debug!(%stage, "stage changed");
        self.emit(UpdateEvent::StageChanged {
            target: target.id.clone(),
            stage,
        });
    }
}

/// Decide whether `target` is stale.
///
/// Versions are compared as raw strings, so a remote downgrade is treated
/// exactly like an upgrade. An absent local version always needs an update,
/// and a bundle is stale when any one of its tracked versions differs.
fn needs_update(target: &UpdateTarget, previous: Option<&str>, manifest: &RemoteManifest) -> bool {
    let version_stale = match previous {
        None => true,
        Some(local) => manifest.get(&target.version_key) != Some(local),
    };

    let extra_stale = target.extra_versions.iter().any(|tracked| {
        let local = version_store::read_raw(&tracked.file);
        local.is_none() || manifest.get(&tracked.key) != local.as_deref()
    });

    let manifest_stale = target.local_manifest.as_ref().is_some_and(|local| {
        match version_store::read_manifest_version(&local.path) {
            None => true,
            Some(version) => manifest.get(&local.remote_key) != Some(version.as_str()),
        }
    });

    version_stale || extra_stale || manifest_stale
}

/// Write every tracked version file from the manifest after an install
fn record_versions(target: &UpdateTarget, manifest: &RemoteManifest) -> Result<(), VersionError> {
    for (key, file) in target.tracked_versions() {
        // Present after fetch_required
        if let Some(version) = manifest.get(key) {
            version_store::write(file, version)?;
        }
    }
    Ok(())
}

/// File name used for a target's downloaded archive
fn archive_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe}.zip")
}
