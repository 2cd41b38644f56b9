//! File handling for Lansend.
//!
//! This module handles:
//! - Sanitizing peer-supplied file names
//! - Streaming upload bodies into the download directory
//! - Hashing local files before they are offered
//!
//! Received files are written directly under the download directory using
//! only the base name of the offered file name. An existing file with the
//! same name is overwritten.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Reduce a peer-supplied file name to its final path component.
///
/// Both `/` and `\` are treated as separators regardless of platform, so
/// `../../etc/passwd` and `..\..\boot.ini` become `passwd` and `boot.ini`.
/// Returns `None` when nothing usable is left.
#[must_use]
pub fn safe_file_name(name: &str) -> Option<String> {
    let base = name
        .split(['/', '\\'])
        .rev()
        .find(|part| !part.is_empty())?;

    if base == "." || base == ".." || base.contains('\0') {
        return None;
    }

    Some(base.to_string())
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// SHA-256 of a file as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// A file written by [`DownloadStore::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Final location on disk
    pub path: PathBuf,
    /// Bytes actually written
    pub bytes: u64,
}

/// Destination directory for received files.
#[derive(Debug, Clone)]
pub struct DownloadStore {
    root: PathBuf,
}

impl DownloadStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where a file offered under `file_name` would be written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the name has no usable base name.
    pub fn destination(&self, file_name: &str) -> Result<PathBuf> {
        let name =
            safe_file_name(file_name).ok_or_else(|| Error::InvalidPath(file_name.to_string()))?;
        Ok(self.root.join(name))
    }

    /// Stream `reader` into the file offered as `file_name`.
    ///
    /// The copy stops with [`Error::TransferCancelled`] when `cancel` fires
    /// and with [`Error::Timeout`] once `limit` elapses. On any failure the
    /// partially written file is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unusable, the copy fails, is
    /// cancelled or times out.
    pub async fn receive<R>(
        &self,
        file_name: &str,
        reader: R,
        cancel: &CancellationToken,
        limit: Duration,
    ) -> Result<ReceivedFile>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.destination(file_name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let mut file = tokio::fs::File::create(&path).await?;

        let result = tokio::select! {
            copied = tokio::time::timeout(limit, copy_into(&mut file, reader)) => {
                copied.unwrap_or_else(|_| Err(Error::Timeout(limit.as_secs())))
            }
            () = cancel.cancelled() => Err(Error::TransferCancelled),
        };
        drop(file);

        match result {
            Ok(bytes) => Ok(ReceivedFile { path, bytes }),
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::debug!(
                        "Could not remove partial file {}: {}",
                        path.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }
}

async fn copy_into<R>(file: &mut tokio::fs::File, mut reader: R) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let written = tokio::io::copy(&mut reader, file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
