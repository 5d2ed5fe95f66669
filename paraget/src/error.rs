//! Error types for the download engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while downloading.
///
/// Each variant is fatal for exactly one task; in a batch, a failing task
/// never aborts its siblings.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Non-timeout network failure. Never retried.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// Connection timed out on every attempt.
    #[error("connection to {url} timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// No filename could be derived from the response.
    #[error("no filename could be derived for {url}")]
    Metadata { url: String },

    /// Disk write failure for one transfer.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The batch was cancelled before this task finished.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Whether this error came from the cancellation handle rather than a
    /// genuine failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}
