//! Cache Validator Module
//!
//! Decides whether a cached snapshot still describes the file on disk.
//! The comparison is deliberately strict: size, modification time and mode
//! must all match exactly, with no tolerance on timestamps. Treating an
//! unchanged file as stale only costs a re-read; the reverse serves old data.

use crate::file_metadata::FileMetadata;
use std::fmt;

/// Field that differed between the cached and observed snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Size,
    ModifiedTime,
    Mode,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Size => write!(f, "size changed"),
            StaleReason::ModifiedTime => write!(f, "modification time changed"),
            StaleReason::Mode => write!(f, "mode changed"),
        }
    }
}

/// Result of validating a cached snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Stateless snapshot comparison
pub struct CacheValidator;

impl CacheValidator {
    /// Compare the snapshot stored with an entry against a freshly observed one.
    ///
    /// Paths are not compared; callers only validate snapshots of the same key.
    pub fn check(stored: &FileMetadata, observed: &FileMetadata) -> Freshness {
        if stored.size != observed.size {
            Freshness::Stale(StaleReason::Size)
        } else if stored.modified != observed.modified {
            Freshness::Stale(StaleReason::ModifiedTime)
        } else if stored.mode != observed.mode {
            Freshness::Stale(StaleReason::Mode)
        } else {
            Freshness::Fresh
        }
    }
}
