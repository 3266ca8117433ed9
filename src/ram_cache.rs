//! RAM Cache Module
//!
//! Byte-bounded in-memory store of file contents keyed by path, with a total
//! recency order from most- to least-recently used. The map and the order live
//! in one `lru::LruCache`, so lookups, promotion to most-recently-used and tail
//! removal are all O(1) and can never disagree about which keys are resident.
//!
//! The store does no locking of its own; `FileCache` owns it behind a mutex.

use crate::cache_types::{CacheEntry, CacheStats, EvictionReason, LookupResult};
use crate::cache_validator::{CacheValidator, Freshness};
use crate::file_metadata::FileMetadata;
use bytes::Bytes;
use lru::LruCache;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default capacity: 64 MiB
pub const DEFAULT_CAPACITY: u64 = 64 * 1024 * 1024;

/// In-memory content store
pub struct RamCache {
    /// Maximum resident bytes
    capacity: u64,
    /// Sum of resident entry sizes
    current_size: u64,
    /// Entries in recency order, keyed by the exact path
    entries: LruCache<PathBuf, CacheEntry>,
    /// Statistics
    hit_count: u64,
    miss_count: u64,
    invalidation_count: u64,
    eviction_count: u64,
    insert_count: u64,
}

impl RamCache {
    /// Create an empty store holding at most `capacity` bytes
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            current_size: 0,
            entries: LruCache::unbounded(),
            hit_count: 0,
            miss_count: 0,
            invalidation_count: 0,
            eviction_count: 0,
            insert_count: 0,
        }
    }

    /// Look up `key`, validating the stored snapshot against `current`.
    ///
    /// A hit promotes the entry to most-recently-used. A stale entry is removed
    /// before `Invalidated` is returned.
    pub fn lookup(&mut self, key: impl AsRef<Path>, current: &FileMetadata) -> LookupResult {
        let key = key.as_ref();
        let freshness = match self.entries.peek(key) {
            Some(entry) => CacheValidator::check(&entry.metadata, current),
            None => {
                self.miss_count += 1;
                debug!(
                    key = %key.display(),
                    size = current.size,
                    cache_size = self.current_size,
                    "Cache miss"
                );
                return LookupResult::Miss;
            }
        };

        match freshness {
            Freshness::Fresh => match self.entries.get(key) {
                Some(entry) => {
                    self.hit_count += 1;
                    debug!(
                        key = %key.display(),
                        size = entry.size(),
                        cache_size = self.current_size,
                        "Cache hit"
                    );
                    LookupResult::Hit(entry.data.clone())
                }
                None => LookupResult::Miss,
            },
            Freshness::Stale(stale_reason) => {
                if let Some(entry) = self.entries.pop(key) {
                    self.current_size = self.current_size.saturating_sub(entry.size());
                    self.invalidation_count += 1;
                    info!(
                        key = %key.display(),
                        size = entry.size(),
                        reason = %EvictionReason::ChangedOnDisk,
                        detail = %stale_reason,
                        cache_size = self.current_size,
                        "Cache evict"
                    );
                }
                LookupResult::Invalidated
            }
        }
    }

    /// Insert content read for `metadata` at the most-recently-used position.
    ///
    /// Room must already have been made. Any previous entry for the same key is
    /// replaced. Returns `false`, leaving the store untouched apart from the
    /// replaced entry, when the content does not fit.
    pub fn insert(&mut self, metadata: FileMetadata, data: Bytes) -> bool {
        let key = metadata.path.clone();
        let entry = CacheEntry::new(metadata, data);
        let entry_size = entry.size();

        if entry_size > self.capacity {
            warn!(
                "Entry {} too large for cache ({} bytes > {} bytes capacity)",
                key.display(),
                entry_size,
                self.capacity
            );
            return false;
        }

        if let Some(existing) = self.entries.pop(&key) {
            self.current_size = self.current_size.saturating_sub(existing.size());
            debug!("Replacing existing cache entry: {}", key.display());
        }

        if self.current_size + entry_size > self.capacity {
            warn!(
                "No room for {} ({} bytes, cache_size {} of {}); not cached",
                key.display(),
                entry_size,
                self.current_size,
                self.capacity
            );
            return false;
        }

        self.current_size += entry_size;
        self.insert_count += 1;

        info!(
            key = %key.display(),
            size = entry_size,
            cache_size = self.current_size,
            "Cache add"
        );

        self.entries.push(key, entry);
        true
    }

    /// Remove `key` if present. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: impl AsRef<Path>) -> Option<CacheEntry> {
        let key = key.as_ref();
        let entry = self.entries.pop(key)?;
        self.current_size = self.current_size.saturating_sub(entry.size());
        debug!("Removed entry from cache: {}", key.display());
        Some(entry)
    }

    /// Remove and return the least-recently-used entry
    pub fn pop_lru(&mut self) -> Option<(PathBuf, CacheEntry)> {
        let (key, entry) = self.entries.pop_lru()?;
        self.current_size = self.current_size.saturating_sub(entry.size());
        self.eviction_count += 1;
        Some((key, entry))
    }

    /// Sum of resident entry sizes
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `key` is resident without touching the recency order
    pub fn contains(&self, key: impl AsRef<Path>) -> bool {
        self.entries.contains(key.as_ref())
    }

    /// Resident keys, most-recently-used first
    pub fn keys(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.current_size = 0;
        info!("Cleared {} entries from cache", dropped);
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        let total_requests = self.hit_count + self.miss_count + self.invalidation_count;
        let hit_rate = if total_requests > 0 {
            self.hit_count as f32 / total_requests as f32
        } else {
            0.0
        };

        CacheStats {
            capacity: self.capacity,
            current_size: self.current_size,
            entries_count: self.entries.len() as u64,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            invalidation_count: self.invalidation_count,
            eviction_count: self.eviction_count,
            insert_count: self.insert_count,
            hit_rate,
        }
    }
}

impl Default for RamCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn meta(path: &str, size: u64) -> FileMetadata {
        FileMetadata::new(
            path,
            size,
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
            0o100644,
        )
    }

    fn content(size: u64) -> Bytes {
        Bytes::from(vec![b'x'; size as usize])
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_ram_cache_basic_operations() {
        let mut cache = RamCache::new(1024);
        let metadata = meta("a.txt", 10);

        assert_eq!(cache.lookup("a.txt", &metadata), LookupResult::Miss);
        assert!(cache.insert(metadata.clone(), content(10)));
        assert_eq!(cache.current_size(), 10);
        assert_eq!(cache.lookup("a.txt", &metadata), LookupResult::Hit(content(10)));

        assert!(cache.remove("a.txt").is_some());
        assert!(cache.remove("a.txt").is_none());
        assert_eq!(cache.current_size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_lookup_removes_entry() {
        let mut cache = RamCache::new(1024);
        let metadata = meta("a.txt", 10);
        cache.insert(metadata.clone(), content(10));

        let mut changed = metadata.clone();
        changed.modified += Duration::from_secs(1);

        assert_eq!(cache.lookup("a.txt", &changed), LookupResult::Invalidated);
        assert!(!cache.contains("a.txt"));
        assert_eq!(cache.current_size(), 0);
        assert_eq!(cache.lookup("a.txt", &changed), LookupResult::Miss);
        assert_eq!(cache.stats().invalidation_count, 1);
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let mut cache = RamCache::new(1024);
        cache.insert(meta("a.txt", 10), content(10));
        cache.insert(meta("a.txt", 30), content(30));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 30);
    }

    #[test]
    fn test_insert_refuses_oversize_entry() {
        let mut cache = RamCache::new(100);

        assert!(!cache.insert(meta("big.bin", 101), content(101)));
        assert!(cache.is_empty());
        assert_eq!(cache.current_size(), 0);
    }

    #[test]
    fn test_insert_refuses_when_full() {
        let mut cache = RamCache::new(100);
        cache.insert(meta("a", 60), content(60));

        assert!(!cache.insert(meta("b", 60), content(60)));
        assert_eq!(cache.keys(), paths(&["a"]));
        assert_eq!(cache.current_size(), 60);
    }

    #[test]
    fn test_hit_moves_entry_to_front() {
        let mut cache = RamCache::new(1024);
        let a = meta("a", 1);
        cache.insert(a.clone(), content(1));
        cache.insert(meta("b", 1), content(1));
        cache.insert(meta("c", 1), content(1));
        assert_eq!(cache.keys(), paths(&["c", "b", "a"]));

        assert!(cache.lookup("a", &a).is_hit());
        assert_eq!(cache.keys(), paths(&["a", "c", "b"]));

        let (evicted, _) = cache.pop_lru().unwrap();
        assert_eq!(evicted, PathBuf::from("b"));
        assert_eq!(cache.stats().eviction_count, 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let mut cache = RamCache::new(200);
        let a = meta("a", 50);
        cache.insert(a.clone(), content(50));
        cache.lookup("a", &a);
        cache.lookup("missing", &meta("missing", 1));

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.insert_count, 1);
        assert_eq!(stats.entries_count, 1);
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.utilization(), 25.0);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_size(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_are_distinct_keys() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let first = PathBuf::from(OsStr::from_bytes(b"f\xff"));
        let second = PathBuf::from(OsStr::from_bytes(b"f\xfe"));
        assert_eq!(first.to_string_lossy(), second.to_string_lossy());

        let mut cache = RamCache::new(1024);
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let first_meta = FileMetadata::new(first.clone(), 4, stamp, 0o100644);
        let second_meta = FileMetadata::new(second.clone(), 4, stamp, 0o100644);
        assert!(cache.insert(first_meta, Bytes::from_static(b"AAAA")));

        assert_eq!(cache.lookup(&second, &second_meta), LookupResult::Miss);
        assert!(cache.insert(second_meta.clone(), Bytes::from_static(b"BBBB")));
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.lookup(&second, &second_meta),
            LookupResult::Hit(Bytes::from_static(b"BBBB"))
        );
    }
}
