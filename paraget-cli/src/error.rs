//! Error type for the CLI front-end.

use std::fmt;

use paraget::DownloadError;

/// Errors surfaced to the terminal user.
#[derive(Debug)]
pub enum CliError {
    /// The engine reported a failure.
    Download(DownloadError),

    /// Process setup failed (signal handler, subscriber, ...).
    Setup(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Download(err) => write!(f, "{}", err),
            CliError::Setup(msg) => write!(f, "setup failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        CliError::Download(err)
    }
}
