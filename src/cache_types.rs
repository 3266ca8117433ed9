//! Cache Types Module
//!
//! Shared data structures for the content cache: resident entries, lookup
//! outcomes, eviction reasons and statistics.

use crate::file_metadata::FileMetadata;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cached file: its full content and the metadata snapshot taken when it
/// was read. Content is immutable once inserted.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub metadata: FileMetadata,
    pub data: Bytes,
}

impl CacheEntry {
    pub fn new(metadata: FileMetadata, data: Bytes) -> Self {
        Self { metadata, data }
    }

    /// Bytes charged against cache capacity
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    /// Entry present and its snapshot matches the caller's metadata
    Hit(Bytes),
    /// No entry for the key
    Miss,
    /// Entry present but stale; it has already been removed
    Invalidated,
}

impl LookupResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, LookupResult::Hit(_))
    }
}

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionReason {
    /// Reclaimed to make room for a new entry
    Lru,
    /// The file's metadata no longer matches the cached snapshot
    ChangedOnDisk,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::Lru => write!(f, "LRU"),
            EvictionReason::ChangedOnDisk => write!(f, "ChangedOnDisk"),
        }
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub capacity: u64,
    pub current_size: u64,
    pub entries_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub invalidation_count: u64,
    pub eviction_count: u64,
    pub insert_count: u64,
    pub hit_rate: f32,
}

impl CacheStats {
    /// Current size as a percentage of capacity
    pub fn utilization(&self) -> f32 {
        if self.capacity > 0 {
            (self.current_size as f32 / self.capacity as f32) * 100.0
        } else {
            0.0
        }
    }
}
