//! Metadata resolution for a single transfer.
//!
//! Given an open response handle, derives everything a transfer worker
//! needs: a filename, the full output path, the declared size and a unique
//! transfer id. Filename resolution prefers the `Content-Disposition`
//! header and falls back to the final URL's last path segment,
//! percent-decoded and sanitized.

use std::path::{Path, PathBuf};

use reqwest::blocking::Response;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Url;
use uuid::Uuid;

use crate::error::{DownloadError, DownloadResult};

/// Unique identifier for one transfer.
///
/// Minted fresh per metadata resolution; ids never collide within a
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(Uuid);

impl TransferId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Byte length advertised by the server, when it advertised one.
///
/// Consumers that compute ratios must branch on `Unknown` instead of
/// dividing by a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredSize {
    /// `Content-Length` was present.
    Known(u64),
    /// No usable `Content-Length`.
    Unknown,
}

impl DeclaredSize {
    /// The declared byte count, if the server sent one.
    pub fn known(&self) -> Option<u64> {
        match self {
            DeclaredSize::Known(bytes) => Some(*bytes),
            DeclaredSize::Unknown => None,
        }
    }
}

/// Everything a transfer worker needs to stream one response to disk.
#[derive(Debug, Clone)]
pub struct TransferMetadata {
    /// Unique id for this transfer.
    pub id: TransferId,
    /// Resolved, sanitized filename.
    pub filename: String,
    /// Full output path (`output_dir` joined with the filename).
    pub path: PathBuf,
    /// Declared size from `Content-Length`, if any.
    pub declared: DeclaredSize,
    /// Final URL the response came from.
    pub url: String,
}

/// Resolve transfer metadata from an open response.
///
/// Fails with [`DownloadError::Metadata`] when no filename can be derived
/// from either the `Content-Disposition` header or the URL path.
pub fn resolve(response: &Response, output_dir: &Path) -> DownloadResult<TransferMetadata> {
    let url = response.url();

    let filename = response
        .headers()
        .get("content-disposition")
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
        .ok_or_else(|| DownloadError::Metadata {
            url: url.to_string(),
        })?;

    let declared = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map_or(DeclaredSize::Unknown, DeclaredSize::Known);

    Ok(TransferMetadata {
        id: TransferId::new(),
        path: output_dir.join(&filename),
        filename,
        declared,
        url: url.to_string(),
    })
}

/// Extract the `filename=` parameter from a `Content-Disposition` header.
///
/// The value is cut at the next `;`-delimited attribute and stripped of
/// quotes and surrounding whitespace.
fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let name = rest
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Derive a filename from the last path segment of the final URL.
fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;

    // Invalid percent-escapes decode lossily rather than failing the task.
    let decoded = urlencoding::decode_binary(segment.as_bytes());
    let mut name = String::from_utf8_lossy(&decoded).into_owned();

    // A decoded '?' starts what was originally a query string.
    if let Some(pos) = name.rfind('?') {
        name.truncate(pos);
    }

    let name = sanitize_filename(&name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Strip characters that are unsafe in filenames on common filesystems.
fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    cleaned.trim().trim_end_matches(['.', ' ']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_disposition_quoted() {
        let name = filename_from_disposition("attachment; filename=\"a.zip\"");
        assert_eq!(name.as_deref(), Some("a.zip"));
    }

    #[test]
    fn test_filename_from_disposition_unquoted_with_attributes() {
        let name = filename_from_disposition("attachment; filename=data.tar.gz; size=123");
        assert_eq!(name.as_deref(), Some("data.tar.gz"));
    }

    #[test]
    fn test_filename_from_disposition_missing_parameter() {
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition("attachment; filename="), None);
    }

    #[test]
    fn test_filename_from_url_percent_decoded() {
        let url = Url::parse("http://example.com/dir/report%20final.pdf?x=1").unwrap();
        assert_eq!(
            filename_from_url(&url).as_deref(),
            Some("report final.pdf")
        );
    }

    #[test]
    fn test_filename_from_url_embedded_query_stripped() {
        // A %3F in the path decodes to '?'; everything after it goes.
        let url = Url::parse("http://example.com/file.bin%3Ftoken=abc").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("file.bin"));
    }

    #[test]
    fn test_filename_from_url_trailing_slash() {
        let url = Url::parse("http://example.com/downloads/").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("downloads"));
    }

    #[test]
    fn test_filename_from_url_bare_host() {
        let url = Url::parse("http://example.com/").unwrap();
        assert_eq!(filename_from_url(&url), None);
    }

    #[test]
    fn test_sanitize_filename_strips_reserved_characters() {
        assert_eq!(sanitize_filename("a<b>c:d|e.txt"), "abcde.txt");
        assert_eq!(sanitize_filename("report?.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("trailing.. "), "trailing");
    }

    #[test]
    fn test_sanitize_filename_keeps_spaces() {
        assert_eq!(sanitize_filename("report final.pdf"), "report final.pdf");
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = TransferId::new();
        let b = TransferId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_declared_size_known() {
        assert_eq!(DeclaredSize::Known(42).known(), Some(42));
        assert_eq!(DeclaredSize::Unknown.known(), None);
    }
}
