//! File Metadata Module
//!
//! The metadata snapshot the serving layer takes before asking the cache for a
//! file's content. The path doubles as the cache key; size, modification time
//! and mode together identify one version of that file.

use crate::{FelixError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Snapshot of a regular file's identity at stat time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Path used to open the file; also the cache key
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, compared exactly
    pub modified: SystemTime,
    /// Permission and file type bits (`st_mode` on Unix)
    pub mode: u32,
}

impl FileMetadata {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime, mode: u32) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            mode,
        }
    }

    /// Build a snapshot from metadata the caller already obtained
    pub fn from_std(path: impl Into<PathBuf>, metadata: &std::fs::Metadata) -> Result<Self> {
        let path = path.into();
        let modified = metadata.modified().map_err(|e| {
            FelixError::IoError(format!(
                "Modification time unavailable for {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            size: metadata.len(),
            modified,
            mode: mode_bits(metadata),
            path,
        })
    }

    /// Stat `path` and return its snapshot.
    ///
    /// Directories and other non-regular files are rejected with
    /// `InvalidRequest`; the cache only ever deals with regular files.
    pub async fn stat(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;

        if !metadata.is_file() {
            return Err(FelixError::InvalidRequest(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        Self::from_std(path, &metadata)
    }

    /// Cache key for this file: the path itself, byte for byte
    pub fn key(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
