//! File Cache Module
//!
//! Entry point used by the serving layer to obtain a file's bytes. Combines the
//! RAM store, the staleness check and the eviction policy with disk reads.
//!
//! Locking: one mutex guards the store and every eviction pass. Disk reads run
//! outside it, so a slow read never blocks hits on other keys. Two concurrent
//! misses for the same key both read the file and the later insert wins; the
//! metadata snapshot inserted is the one the caller passed in, not a re-stat
//! taken after the read.

use crate::cache_types::{CacheStats, LookupResult};
use crate::config::CacheConfig;
use crate::eviction::{EvictionPolicy, LruEviction};
use crate::file_metadata::FileMetadata;
use crate::ram_cache::RamCache;
use crate::{FelixError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Shared, capacity-bounded cache of file contents
pub struct FileCache {
    store: Mutex<RamCache>,
    policy: Box<dyn EvictionPolicy>,
    capacity: u64,
    enabled: bool,
    bypass_count: AtomicU64,
    disk_read_count: AtomicU64,
}

impl FileCache {
    /// Create an LRU cache holding at most `capacity` bytes
    pub fn new(capacity: u64) -> Self {
        Self::with_policy(capacity, Box::new(LruEviction))
    }

    /// Create a cache with a specific eviction policy
    pub fn with_policy(capacity: u64, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            store: Mutex::new(RamCache::new(capacity)),
            policy,
            capacity,
            enabled: true,
            bypass_count: AtomicU64::new(0),
            disk_read_count: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::with_policy(config.capacity, config.eviction_algorithm.policy());
        cache.enabled = config.enabled;

        if cache.enabled {
            info!(
                "File cache enabled: capacity={} bytes, eviction={}",
                cache.capacity,
                cache.policy.name()
            );
        } else {
            info!("File cache disabled: every request reads from disk");
        }

        cache
    }

    /// Return the full content of the file described by `metadata`.
    ///
    /// Serves a validated hit from memory; otherwise reads the file once from
    /// disk and, when it can ever fit, caches it. Files larger than the whole
    /// cache are read through without caching. Read failures are returned and
    /// leave the cache unchanged.
    pub async fn retrieve_file(&self, metadata: &FileMetadata) -> Result<Bytes> {
        if !self.enabled {
            return self.read_from_disk(metadata).await;
        }

        let key = metadata.key();

        if metadata.size > self.capacity {
            self.bypass_count.fetch_add(1, Ordering::Relaxed);
            info!(
                key = %key.display(),
                size = metadata.size,
                capacity = self.capacity,
                "Cache bypass: file larger than cache capacity"
            );
            return self.read_from_disk(metadata).await;
        }

        {
            let mut store = self.lock_store()?;
            if let LookupResult::Hit(data) = store.lookup(&key, metadata) {
                return Ok(data);
            }
        }

        let data = self.read_from_disk(metadata).await?;

        {
            let mut store = self.lock_store()?;

            if store.current_size() + metadata.size > store.capacity() {
                let outcome = self.policy.make_room(&mut store, metadata.size);
                if !outcome.room_made {
                    warn!(
                        "Could not make room for {} ({} bytes); serving uncached",
                        key.display(),
                        metadata.size
                    );
                    return Ok(data);
                }
            }

            if !store.insert(metadata.clone(), data.clone()) {
                warn!(
                    "Insert refused for {} ({} bytes); serving uncached",
                    key.display(),
                    metadata.size
                );
            }
        }

        Ok(data)
    }

    /// Read exactly `metadata.size` bytes from `metadata.path`
    async fn read_from_disk(&self, metadata: &FileMetadata) -> Result<Bytes> {
        self.disk_read_count.fetch_add(1, Ordering::Relaxed);

        let path = &metadata.path;
        let len = usize::try_from(metadata.size).map_err(|_| {
            FelixError::DiskReadFailure(format!(
                "File too large to read into memory: {} ({} bytes)",
                path.display(),
                metadata.size
            ))
        })?;

        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            FelixError::DiskReadFailure(format!("Cannot open {}: {}", path.display(), e))
        })?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await.map_err(|e| {
            FelixError::DiskReadFailure(format!("Cannot read {}: {}", path.display(), e))
        })?;

        debug!("Read {} bytes from disk: {}", len, path.display());
        Ok(Bytes::from(buf))
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, RamCache>> {
        self.store
            .lock()
            .map_err(|e| FelixError::LockError(format!("Cache store lock poisoned: {}", e)))
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sum of resident entry sizes
    pub fn current_size(&self) -> Result<u64> {
        Ok(self.lock_store()?.current_size())
    }

    /// Check whether `key` is resident without affecting recency
    pub fn contains(&self, key: impl AsRef<Path>) -> Result<bool> {
        Ok(self.lock_store()?.contains(key))
    }

    /// Drop the entry for `key`, if any
    pub fn remove(&self, key: impl AsRef<Path>) -> Result<()> {
        self.lock_store()?.remove(key);
        Ok(())
    }

    /// Resident keys, most-recently-used first
    pub fn keys(&self) -> Result<Vec<PathBuf>> {
        Ok(self.lock_store()?.keys())
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.lock_store()?.clear();
        Ok(())
    }

    /// Store statistics
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.lock_store()?.stats())
    }

    /// Number of oversize files served without caching
    pub fn bypass_count(&self) -> u64 {
        self.bypass_count.load(Ordering::Relaxed)
    }

    /// Number of disk reads performed
    pub fn disk_read_count(&self) -> u64 {
        self.disk_read_count.load(Ordering::Relaxed)
    }
}
