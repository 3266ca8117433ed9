//! Eviction Module
//!
//! Policies that reclaim space in a `RamCache` before a new entry is inserted.
//! Eviction only ever runs synchronously on the miss path, with the store lock
//! held by the caller.

use crate::cache_types::EvictionReason;
use crate::ram_cache::RamCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Outcome of a `make_room` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Entries removed during the pass
    pub entries_evicted: u64,
    /// Bytes released during the pass
    pub bytes_evicted: u64,
    /// Whether `required_bytes` now fits
    pub room_made: bool,
}

/// Strategy for reclaiming space in the store
pub trait EvictionPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Evict entries until `required_bytes` fits or the store is empty.
    ///
    /// When `required_bytes` exceeds the store's capacity the pass empties the
    /// store and reports `room_made: false`; callers must not insert.
    fn make_room(&self, store: &mut RamCache, required_bytes: u64) -> EvictionOutcome;
}

/// Least-recently-used eviction
#[derive(Debug, Clone, Copy, Default)]
pub struct LruEviction;

impl EvictionPolicy for LruEviction {
    fn name(&self) -> &'static str {
        "LRU"
    }

    fn make_room(&self, store: &mut RamCache, required_bytes: u64) -> EvictionOutcome {
        let mut outcome = EvictionOutcome::default();

        while store.current_size() + required_bytes > store.capacity() {
            let Some((key, entry)) = store.pop_lru() else {
                break;
            };

            outcome.entries_evicted += 1;
            outcome.bytes_evicted += entry.size();

            info!(
                key = %key.display(),
                size = entry.size(),
                reason = %EvictionReason::Lru,
                cache_size = store.current_size(),
                "Cache evict"
            );
        }

        outcome.room_made = store.current_size() + required_bytes <= store.capacity();

        if outcome.entries_evicted > 0 {
            debug!(
                "Eviction pass freed {} bytes across {} entries (room_made: {})",
                outcome.bytes_evicted, outcome.entries_evicted, outcome.room_made
            );
        }

        outcome
    }
}

/// Eviction algorithm selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionAlgorithm {
    #[default]
    Lru,
}

impl EvictionAlgorithm {
    /// Instantiate the policy for this algorithm
    pub fn policy(&self) -> Box<dyn EvictionPolicy> {
        match self {
            EvictionAlgorithm::Lru => Box::new(LruEviction),
        }
    }
}

impl fmt::Display for EvictionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionAlgorithm::Lru => write!(f, "lru"),
        }
    }
}
