//! Configuration for the download engine.

use std::time::Duration;

/// Configuration for a [`Downloader`](crate::Downloader).
///
/// All options have conservative defaults; use the `with_*` builders to
/// adjust individual knobs.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Whether to log a summary report after a batch download completes.
    pub bulk_download_report: bool,

    /// Suppress renderer coupling entirely.
    ///
    /// Lifecycle events are still published; only the post-completion
    /// settle pause (which exists so an attached renderer can paint its
    /// final frame) is skipped.
    pub no_progress: bool,

    /// Number of additional attempts after a connection timeout.
    pub retry_count: u32,

    /// Maximum number of worker threads for fetching, metadata resolution
    /// and transfers. Clamped to at least 1.
    pub parallel_downloads: usize,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Whether human-readable status lines should be surfaced.
    ///
    /// The engine emits status through `tracing`; front-ends map this flag
    /// onto their subscriber filter.
    pub verbose: bool,

    /// Pause after the batch COMPLETED event before returning, giving an
    /// attached renderer time to paint the final state.
    pub settle_delay: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            bulk_download_report: true,
            no_progress: false,
            retry_count: 1,
            parallel_downloads: 5,
            timeout: Duration::from_secs(10),
            verbose: true,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl DownloadConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the bulk download summary report.
    pub fn with_bulk_download_report(mut self, enabled: bool) -> Self {
        self.bulk_download_report = enabled;
        self
    }

    /// Enable or disable renderer coupling.
    pub fn with_no_progress(mut self, no_progress: bool) -> Self {
        self.no_progress = no_progress;
        self
    }

    /// Set the number of retries after a connection timeout.
    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    /// Set the maximum number of parallel downloads (minimum 1).
    pub fn with_parallel_downloads(mut self, parallel: usize) -> Self {
        self.parallel_downloads = parallel.max(1);
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable verbose status output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the settle pause performed after batch completion.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}
