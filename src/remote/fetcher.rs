//! Streaming archive downloads
//!
//! The response body is written to disk chunk by chunk as it arrives; the
//! archive is never buffered in memory. A destination left over from an
//! earlier attempt is removed first, and a failed transfer removes its
//! partial file.

use crate::error::DownloadError;
use crate::remote::{HttpClient, RequestFailure};
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Minimum interval between progress callback invocations
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Progress callback: `(bytes_downloaded, total_from_content_length)`
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Downloads archives to local files
#[derive(Clone)]
pub struct ArchiveFetcher {
    client: HttpClient,
}

impl ArchiveFetcher {
    /// Create a new archive fetcher
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// `idle_timeout` bounds the wait for the response head and every gap
    /// between body chunks, not the transfer as a whole, so a slow but live
    /// download of a large bundle is allowed to finish.
    ///
    /// Fails if the status is not 2xx, the server stalls for longer than
    /// `idle_timeout`, the body is shorter than its Content-Length, or the
    /// resulting file is empty.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        headers: &BTreeMap<String, String>,
        idle_timeout: Duration,
        on_progress: &ProgressFn<'_>,
    ) -> Result<u64, DownloadError> {
        remove_stale(dest).await?;

        let result = self
            .stream_to_file(url, dest, headers, idle_timeout, on_progress)
            .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        headers: &BTreeMap<String, String>,
        idle_timeout: Duration,
        on_progress: &ProgressFn<'_>,
    ) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get_streaming(url, headers, idle_timeout)
            .await
            .map_err(|f| f.into_download_error(url))?;

        let total = response.content_length();
        tracing::debug!(url, total, "download started");

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_report = Instant::now();
        on_progress(0, total);

        loop {
            let next = tokio::time::timeout(idle_timeout, stream.next())
                .await
                .map_err(|_| {
                    tracing::warn!(url, downloaded, "download stalled");
                    RequestFailure::Timeout.into_download_error(url)
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| RequestFailure::from_reqwest(&e).into_download_error(url))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(dest, e))?;
            downloaded += chunk.len() as u64;

            if last_report.elapsed() >= PROGRESS_INTERVAL {
                on_progress(downloaded, total);
                last_report = Instant::now();
            }
        }

        file.flush().await.map_err(|e| DownloadError::io(dest, e))?;
        file.sync_all().await.map_err(|e| DownloadError::io(dest, e))?;
        drop(file);
        on_progress(downloaded, total);

        if let Some(expected) = total {
            if downloaded < expected {
                return Err(DownloadError::Truncated {
                    expected,
                    actual: downloaded,
                });
            }
        }

        let on_disk = tokio::fs::metadata(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?
            .len();
        if on_disk == 0 {
            return Err(DownloadError::Empty {
                path: dest.to_path_buf(),
            });
        }

        tracing::info!(url, bytes = on_disk, path = %dest.display(), "download complete");
        Ok(on_disk)
    }
}

/// Remove whatever an earlier attempt left at `dest`
async fn remove_stale(dest: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => {
            tracing::debug!(path = %dest.display(), "removed stale download");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::io(dest, e)),
    }
}
