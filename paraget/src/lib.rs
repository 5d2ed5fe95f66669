//! Paraget - concurrent HTTP file downloading
//!
//! Given one URL or a list of URLs, the engine resolves filenames and sizes
//! from response headers, streams bodies to disk through a bounded pool of
//! worker threads, and merges per-transfer byte counters into a single
//! progress feed published over an event bus.
//!
//! # Architecture
//!
//! ```text
//! caller ──► Fetcher ──► Metadata Resolver ──► WorkerPool
//!                                                  │
//!                                          Transfer Workers
//!                                                  │ ticks
//!                                          BatchProgress (aggregate)
//!                                                  │
//!                                              EventBus ──► subscribers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use paraget::{DownloadConfig, Downloader, DownloadEvent, EventKind};
//!
//! let downloader = Downloader::new(DownloadConfig::default())?;
//!
//! downloader.events().subscribe(EventKind::Progress, |event| {
//!     if let DownloadEvent::Progress { percent, .. } = event {
//!         println!("{}%", percent);
//!     }
//! });
//!
//! let report = downloader.download_list(&urls, Path::new("downloads"))?;
//! println!("{} succeeded, {} failed", report.succeeded.len(), report.failed.len());
//! ```

pub mod cancel;
pub mod config;
pub mod downloader;
pub mod error;
pub mod event;
pub mod fetch;
pub mod metadata;
pub mod pool;
pub mod progress;
pub mod transfer;
pub mod util;

pub use cancel::CancelHandle;
pub use config::DownloadConfig;
pub use downloader::{BatchReport, CompletedTransfer, Downloader, FailedTransfer};
pub use error::{DownloadError, DownloadResult};
pub use event::{DownloadEvent, EventBus, EventKind};
pub use metadata::{DeclaredSize, TransferId, TransferMetadata};
pub use transfer::ProgressSample;
pub use util::format_bytes;
