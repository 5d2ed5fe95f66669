//! High-level download orchestration.
//!
//! [`Downloader`] ties the pieces together: fetch (with retries), a status
//! gate, metadata resolution, the bounded worker pool, the batch progress
//! aggregate and the event bus. Per-task errors are isolated throughout; a
//! failing transfer never aborts its siblings or deadlocks the pool.
//!
//! Batches run in two pool phases: metadata resolution completes for every
//! entry before the first transfer starts, so the aggregate knows the total
//! transfer count and byte total up front.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Response;
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::event::EventBus;
use crate::fetch::Fetcher;
use crate::metadata::{self, DeclaredSize, TransferMetadata};
use crate::pool::WorkerPool;
use crate::progress::BatchProgress;
use crate::transfer;
use crate::util::format_bytes;

/// One successfully written file.
#[derive(Debug, Clone)]
pub struct CompletedTransfer {
    /// Final URL the file came from.
    pub url: String,
    /// Resolved filename.
    pub filename: String,
    /// Full path of the written file.
    pub path: PathBuf,
    /// Bytes written to disk.
    pub bytes: u64,
}

/// One task that failed permanently.
#[derive(Debug)]
pub struct FailedTransfer {
    /// The URL as submitted by the caller (or the final URL for failures
    /// past the fetch stage).
    pub url: String,
    /// Why the task failed.
    pub error: DownloadError,
}

/// Outcome of a batch download.
///
/// The report covers every de-duplicated input URL, including those that
/// failed before reaching the transfer phase; the COMPLETED event's
/// counters cover only transfers that entered it.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Transfers fully written to disk.
    pub succeeded: Vec<CompletedTransfer>,
    /// Tasks that failed at any stage.
    pub failed: Vec<FailedTransfer>,
    /// Total bytes recorded by the aggregator, including partial bytes of
    /// transfers that later failed.
    pub downloaded_bytes: u64,
}

impl BatchReport {
    /// Number of tasks in the batch.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every task succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Concurrent HTTP file downloader.
///
/// Construct once, subscribe listeners on [`events`](Self::events), then
/// call [`download`](Self::download) or
/// [`download_list`](Self::download_list).
pub struct Downloader {
    config: DownloadConfig,
    fetcher: Fetcher,
    events: Arc<EventBus>,
    cancel: CancelHandle,
}

impl Downloader {
    /// Create a downloader from the given configuration.
    pub fn new(config: DownloadConfig) -> DownloadResult<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            events: Arc::new(EventBus::new()),
            cancel: CancelHandle::new(),
        })
    }

    /// The event bus lifecycle events are published on.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// A handle that cancels in-flight work when triggered.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The active configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    fn settle_delay(&self) -> Duration {
        if self.config.no_progress {
            Duration::ZERO
        } else {
            self.config.settle_delay
        }
    }

    /// Download a single URL into `output_dir`.
    ///
    /// Degenerates to one synchronous call; the same lifecycle events are
    /// published as for a batch of one.
    pub fn download(&self, url: &str, output_dir: &Path) -> DownloadResult<CompletedTransfer> {
        info!(url, dir = %output_dir.display(), "starting download");

        let response = self.fetcher.fetch(url)?;
        let response = check_status(url.to_string(), response).map_err(|f| f.error)?;

        let meta = metadata::resolve(&response, output_dir)?;
        let progress = BatchProgress::new(self.events(), self.settle_delay());
        progress.init(1, meta.declared.known().unwrap_or(0));

        let result = transfer::transfer(
            response,
            &meta,
            |m| info!(filename = %m.filename, size = %declared_label(m.declared), "downloading"),
            |s| progress.record(s),
            &self.cancel,
        );

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                progress.record_failure(Some(meta.id));
                progress.wait_settle();
                return Err(e);
            }
        };

        progress.wait_settle();
        info!(filename = %meta.filename, bytes, "download complete");

        Ok(CompletedTransfer {
            url: meta.url,
            filename: meta.filename,
            path: meta.path,
            bytes,
        })
    }

    /// Download a list of URLs into `output_dir`.
    ///
    /// Duplicates are removed first (first occurrence wins). Fetching,
    /// metadata resolution and transfers each run through the worker pool
    /// at `parallel_downloads` width. Per-task failures land in the report
    /// instead of aborting the batch.
    pub fn download_list(
        &self,
        urls: &[String],
        output_dir: &Path,
    ) -> DownloadResult<BatchReport> {
        let urls = dedupe(urls);
        let pool = WorkerPool::new(self.config.parallel_downloads);
        let mut failed: Vec<FailedTransfer> = Vec::new();

        info!(count = urls.len(), dir = %output_dir.display(), "found files to download");

        // Phase 1a: open all responses.
        let responses = self.fetch_phase(urls, &pool, &mut failed);

        // Phase 1b: resolve all metadata before any transfer begins.
        info!("gathering download metadata");
        let transfers = self.metadata_phase(responses, output_dir, &pool, &mut failed);

        let total = transfers.len();
        let total_known_bytes: u64 = transfers
            .iter()
            .filter_map(|(_, meta)| meta.declared.known())
            .sum();

        let progress = Arc::new(BatchProgress::new(self.events(), self.settle_delay()));
        progress.init(total, total_known_bytes);

        info!(
            count = total,
            size = %format_bytes(total_known_bytes),
            "starting download"
        );

        // Phase 2: stream everything to disk.
        let succeeded = self.transfer_phase(transfers, &pool, &progress, &mut failed);

        progress.wait_settle();

        let report = BatchReport {
            downloaded_bytes: progress.downloaded_bytes(),
            succeeded,
            failed,
        };

        if self.config.bulk_download_report {
            info!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                size = %format_bytes(report.downloaded_bytes),
                "batch finished"
            );
            for failure in &report.failed {
                warn!(url = %failure.url, "download failed: {}", failure.error);
            }
        }

        Ok(report)
    }

    fn fetch_phase(
        &self,
        urls: Vec<String>,
        pool: &WorkerPool,
        failed: &mut Vec<FailedTransfer>,
    ) -> Vec<(String, Response)> {
        if self.cancel.is_cancelled() {
            failed.extend(urls.into_iter().map(|url| FailedTransfer {
                url,
                error: DownloadError::Cancelled,
            }));
            return Vec::new();
        }

        let mut responses = Vec::new();
        for (url, result) in self.fetcher.fetch_many(urls, pool) {
            let checked = match result {
                Ok(response) => check_status(url.clone(), response),
                Err(error) => Err(FailedTransfer { url: url.clone(), error }),
            };
            match checked {
                Ok(response) => responses.push((url, response)),
                Err(failure) => {
                    warn!(url = %failure.url, "fetch failed: {}", failure.error);
                    failed.push(failure);
                }
            }
        }

        info!(
            available = responses.len(),
            failed = failed.len(),
            "responses gathered"
        );
        responses
    }

    fn metadata_phase(
        &self,
        responses: Vec<(String, Response)>,
        output_dir: &Path,
        pool: &WorkerPool,
        failed: &mut Vec<FailedTransfer>,
    ) -> Vec<(Response, TransferMetadata)> {
        if self.cancel.is_cancelled() {
            failed.extend(responses.into_iter().map(|(url, _)| FailedTransfer {
                url,
                error: DownloadError::Cancelled,
            }));
            return Vec::new();
        }

        let urls: Vec<String> = responses.iter().map(|(url, _)| url.clone()).collect();
        let dir = output_dir.to_path_buf();

        let resolved = pool.run(responses, move |_, (url, response): (String, Response)| {
            let meta = metadata::resolve(&response, &dir);
            (url, response, meta)
        });

        let mut transfers = Vec::new();
        for (slot, url) in resolved.into_iter().zip(urls) {
            match slot {
                Some((_, response, Ok(meta))) => transfers.push((response, meta)),
                Some((url, _, Err(error))) => {
                    warn!(url = %url, "metadata resolution failed: {}", error);
                    failed.push(FailedTransfer { url, error });
                }
                None => failed.push(FailedTransfer {
                    url: url.clone(),
                    error: DownloadError::Transport {
                        url,
                        reason: "metadata worker panicked".to_string(),
                    },
                }),
            }
        }
        transfers
    }

    fn transfer_phase(
        &self,
        transfers: Vec<(Response, TransferMetadata)>,
        pool: &WorkerPool,
        progress: &Arc<BatchProgress>,
        failed: &mut Vec<FailedTransfer>,
    ) -> Vec<CompletedTransfer> {
        let urls: Vec<String> = transfers.iter().map(|(_, meta)| meta.url.clone()).collect();
        let cancel = self.cancel.clone();
        let worker_progress = Arc::clone(progress);

        let results = pool.run(
            transfers,
            move |_, (response, meta): (Response, TransferMetadata)| {
                let progress = Arc::clone(&worker_progress);
                let result = transfer::transfer(
                    response,
                    &meta,
                    |m| debug!(filename = %m.filename, size = %declared_label(m.declared), "transfer starting"),
                    |s| progress.record(s),
                    &cancel,
                );
                if result.is_err() {
                    progress.record_failure(Some(meta.id));
                }
                (meta, result)
            },
        );

        let mut succeeded = Vec::new();
        for (slot, url) in results.into_iter().zip(urls) {
            match slot {
                Some((meta, Ok(bytes))) => succeeded.push(CompletedTransfer {
                    url: meta.url,
                    filename: meta.filename,
                    path: meta.path,
                    bytes,
                }),
                Some((meta, Err(error))) => failed.push(FailedTransfer {
                    url: meta.url,
                    error,
                }),
                None => {
                    // The worker died without reporting; close its slot in
                    // the aggregate so COMPLETED still fires.
                    progress.record_failure(None);
                    failed.push(FailedTransfer {
                        url: url.clone(),
                        error: DownloadError::Transport {
                            url,
                            reason: "transfer worker panicked".to_string(),
                        },
                    });
                }
            }
        }
        succeeded
    }
}

/// Reject non-success statuses before any body is consumed.
fn check_status(url: String, response: Response) -> Result<Response, FailedTransfer> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FailedTransfer {
            url: url.clone(),
            error: DownloadError::HttpStatus {
                status: status.as_u16(),
                url,
            },
        })
    }
}

fn declared_label(declared: DeclaredSize) -> String {
    match declared.known() {
        Some(bytes) => format_bytes(bytes),
        None => "unknown size".to_string(),
    }
}

/// Remove duplicate URLs, keeping the first occurrence of each.
fn dedupe(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}
