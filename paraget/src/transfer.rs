//! Streaming one response body to disk.
//!
//! A transfer worker owns its response handle and output file exclusively;
//! both are released on every exit path. The only thing it shares with the
//! rest of the batch is the tick callback.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};

use reqwest::blocking::Response;
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::error::{DownloadError, DownloadResult};
use crate::metadata::{DeclaredSize, TransferId, TransferMetadata};

/// Bytes read from the network and written to disk per tick.
pub const CHUNK_SIZE: usize = 1024;

/// One progress update from a transfer worker.
///
/// Written by exactly one worker, in stream order; `downloaded` is
/// non-decreasing and the final sample has `finished == true`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    /// Transfer this sample belongs to.
    pub id: TransferId,
    /// Bytes written to disk so far.
    pub downloaded: u64,
    /// Declared size of the transfer.
    pub declared: DeclaredSize,
    /// Set on the terminal sample, exactly once per transfer.
    pub finished: bool,
}

impl ProgressSample {
    /// Percentage of the transfer completed.
    ///
    /// `None` while the declared size is unknown and the transfer is still
    /// running; the terminal sample always reports `Some(100)` regardless
    /// of how the intermediate math rounded.
    pub fn percent(&self) -> Option<u8> {
        if self.finished {
            return Some(100);
        }
        match self.declared {
            DeclaredSize::Known(total) if total > 0 => {
                Some(((self.downloaded.saturating_mul(100)) / total).min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Stream `response` to `metadata.path` in [`CHUNK_SIZE`] chunks.
///
/// Creates the output directory if absent and truncates any existing file.
/// `init` runs exactly once before the first chunk; `tick` runs after every
/// written chunk and once more with a terminal sample after the stream is
/// exhausted. Returns the number of bytes written.
pub fn transfer<I, T>(
    mut response: Response,
    metadata: &TransferMetadata,
    init: I,
    mut tick: T,
    cancel: &CancelHandle,
) -> DownloadResult<u64>
where
    I: FnOnce(&TransferMetadata),
    T: FnMut(ProgressSample),
{
    if let Some(parent) = metadata.path.parent() {
        fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = File::create(&metadata.path).map_err(|source| DownloadError::Io {
        path: metadata.path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    init(metadata);

    let mut buffer = [0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!(url = %metadata.url, "transfer cancelled");
            return Err(DownloadError::Cancelled);
        }

        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| DownloadError::Transport {
                url: metadata.url.clone(),
                reason: format!("read error: {}", e),
            })?;

        if bytes_read == 0 {
            break;
        }

        // Write before accounting, so a reported byte is a persisted byte.
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|source| DownloadError::Io {
                path: metadata.path.clone(),
                source,
            })?;

        downloaded += bytes_read as u64;

        tick(ProgressSample {
            id: metadata.id,
            downloaded,
            declared: metadata.declared,
            finished: false,
        });
    }

    writer.flush().map_err(|source| DownloadError::Io {
        path: metadata.path.clone(),
        source,
    })?;

    tick(ProgressSample {
        id: metadata.id,
        downloaded,
        declared: metadata.declared,
        finished: true,
    });

    debug!(url = %metadata.url, bytes = downloaded, "transfer complete");
    Ok(downloaded)
}
