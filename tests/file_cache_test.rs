//! File cache retrieval tests
//!
//! Exercises `FileCache::retrieve_file` against real files: read-through,
//! hits, invalidation when the file changes, LRU eviction order, oversize
//! bypass and concurrent callers.

use felix::file_cache::FileCache;
use felix::file_metadata::FileMetadata;
use felix::FelixError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn create_file(dir: &TempDir, name: &str, data: &[u8]) -> FileMetadata {
    let path = dir.path().join(name);
    tokio::fs::write(&path, data).await.unwrap();
    FileMetadata::stat(&path).await.unwrap()
}

fn pattern(size: usize, seed: u8) -> Vec<u8> {
    (0..size).map(|i| seed.wrapping_add(i as u8)).collect()
}

#[tokio::test]
async fn test_read_through_then_hit_returns_identical_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let data = pattern(4096, 7);
    let metadata = create_file(&temp_dir, "data.bin", &data).await;
    let cache = FileCache::new(64 * 1024);

    let miss = cache.retrieve_file(&metadata).await.unwrap();
    assert_eq!(&miss[..], &data[..]);
    assert_eq!(cache.disk_read_count(), 1);

    let hit = cache.retrieve_file(&metadata).await.unwrap();
    assert_eq!(hit, miss);
    assert_eq!(cache.disk_read_count(), 1, "hit must not touch the disk");
}

#[tokio::test]
async fn test_repeated_retrieval_keeps_one_entry_per_key() {
    let temp_dir = TempDir::new().unwrap();
    let metadata = create_file(&temp_dir, "same.txt", b"unchanging content").await;
    let cache = FileCache::new(1024);

    let first = cache.retrieve_file(&metadata).await.unwrap();
    for _ in 0..10 {
        let again = cache.retrieve_file(&metadata).await.unwrap();
        assert_eq!(again, first);
    }

    let stats = cache.stats().unwrap();
    assert_eq!(stats.entries_count, 1);
    assert_eq!(stats.current_size, metadata.size);
    assert_eq!(stats.hit_count, 10);
    assert_eq!(cache.disk_read_count(), 1);
}

#[tokio::test]
async fn test_changed_file_is_reread() {
    let temp_dir = TempDir::new().unwrap();
    let original = create_file(&temp_dir, "doc.txt", b"version one").await;
    let cache = FileCache::new(1024);

    let first = cache.retrieve_file(&original).await.unwrap();
    assert_eq!(&first[..], b"version one");

    let updated = create_file(&temp_dir, "doc.txt", b"version two, longer").await;
    let second = cache.retrieve_file(&updated).await.unwrap();

    assert_eq!(&second[..], b"version two, longer");
    assert_eq!(cache.disk_read_count(), 2);

    let stats = cache.stats().unwrap();
    assert_eq!(stats.invalidation_count, 1);
    assert_eq!(stats.entries_count, 1);
    assert_eq!(stats.current_size, updated.size);
}

#[tokio::test]
async fn test_mtime_only_change_invalidates() {
    let temp_dir = TempDir::new().unwrap();
    let metadata = create_file(&temp_dir, "touch.txt", b"same bytes").await;
    let cache = FileCache::new(1024);
    cache.retrieve_file(&metadata).await.unwrap();

    let mut touched = metadata.clone();
    touched.modified += Duration::from_nanos(1);
    cache.retrieve_file(&touched).await.unwrap();

    assert_eq!(cache.disk_read_count(), 2);
    assert_eq!(cache.stats().unwrap().invalidation_count, 1);

    // The re-inserted snapshot is the touched one
    cache.retrieve_file(&touched).await.unwrap();
    assert_eq!(cache.disk_read_count(), 2);
}

#[tokio::test]
async fn test_lru_evicts_least_recently_used() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_file(&temp_dir, "a", &pattern(10, 1)).await;
    let b = create_file(&temp_dir, "b", &pattern(20, 2)).await;
    let c = create_file(&temp_dir, "c", &pattern(30, 3)).await;
    let d = create_file(&temp_dir, "d", &pattern(20, 4)).await;
    let cache = FileCache::new(a.size + b.size + c.size);

    cache.retrieve_file(&a).await.unwrap();
    cache.retrieve_file(&b).await.unwrap();
    cache.retrieve_file(&c).await.unwrap();
    assert_eq!(cache.current_size().unwrap(), 60);

    // Touch A so B becomes the least recently used entry
    cache.retrieve_file(&a).await.unwrap();
    cache.retrieve_file(&d).await.unwrap();

    assert!(cache.contains(&a.key()).unwrap());
    assert!(!cache.contains(&b.key()).unwrap());
    assert!(cache.contains(&c.key()).unwrap());
    assert!(cache.contains(&d.key()).unwrap());
    assert_eq!(
        cache.keys().unwrap(),
        vec![d.path.clone(), a.path.clone(), c.path.clone()]
    );
    assert_eq!(cache.current_size().unwrap(), 60);
    assert_eq!(cache.stats().unwrap().eviction_count, 1);
}

#[tokio::test]
async fn test_oversize_file_is_served_but_not_cached() {
    let temp_dir = TempDir::new().unwrap();
    let data = pattern(64, 9);
    let metadata = create_file(&temp_dir, "big.bin", &data).await;
    let cache = FileCache::new(32);

    let content = cache.retrieve_file(&metadata).await.unwrap();

    assert_eq!(&content[..], &data[..]);
    assert!(!cache.contains(&metadata.key()).unwrap());
    assert_eq!(cache.current_size().unwrap(), 0);
    assert_eq!(cache.bypass_count(), 1);

    // Still read through on every call
    cache.retrieve_file(&metadata).await.unwrap();
    assert_eq!(cache.disk_read_count(), 2);
}

#[tokio::test]
async fn test_file_exactly_at_capacity_is_cached() {
    let temp_dir = TempDir::new().unwrap();
    let small = create_file(&temp_dir, "small", &pattern(8, 0)).await;
    let full = create_file(&temp_dir, "full", &pattern(32, 0)).await;
    let cache = FileCache::new(32);

    cache.retrieve_file(&small).await.unwrap();
    cache.retrieve_file(&full).await.unwrap();

    assert!(cache.contains(&full.key()).unwrap());
    assert!(!cache.contains(&small.key()).unwrap());
    assert_eq!(cache.current_size().unwrap(), 32);
}

#[tokio::test]
async fn test_read_failure_propagates_and_caches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let metadata = create_file(&temp_dir, "vanishing.txt", b"here today").await;
    tokio::fs::remove_file(&metadata.path).await.unwrap();
    let cache = FileCache::new(1024);

    let result = cache.retrieve_file(&metadata).await;

    match result {
        Err(FelixError::DiskReadFailure(msg)) => assert!(msg.contains("vanishing.txt")),
        other => panic!("expected DiskReadFailure, got {:?}", other),
    }
    assert_eq!(cache.current_size().unwrap(), 0);
    assert_eq!(cache.stats().unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_oversize_read_failure_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let metadata = create_file(&temp_dir, "huge.bin", &pattern(100, 0)).await;
    tokio::fs::remove_file(&metadata.path).await.unwrap();
    let cache = FileCache::new(10);

    let result = cache.retrieve_file(&metadata).await;
    assert!(matches!(result, Err(FelixError::DiskReadFailure(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_paths_with_same_lossy_name_are_cached_separately() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    let first_path = temp_dir.path().join(OsStr::from_bytes(b"f\xff"));
    let second_path = temp_dir.path().join(OsStr::from_bytes(b"f\xfe"));
    tokio::fs::write(&first_path, b"AAAA").await.unwrap();
    tokio::fs::write(&second_path, b"BBBB").await.unwrap();

    let first = FileMetadata::stat(&first_path).await.unwrap();
    let mut second = FileMetadata::stat(&second_path).await.unwrap();
    // Same size, mtime and mode: only the path tells them apart
    second.modified = first.modified;
    second.mode = first.mode;
    assert_eq!(first_path.to_string_lossy(), second_path.to_string_lossy());

    let cache = FileCache::new(1024);
    assert_eq!(&cache.retrieve_file(&first).await.unwrap()[..], b"AAAA");
    assert_eq!(&cache.retrieve_file(&second).await.unwrap()[..], b"BBBB");

    assert_eq!(cache.disk_read_count(), 2);
    assert_eq!(cache.stats().unwrap().entries_count, 2);
    assert_eq!(&cache.retrieve_file(&first).await.unwrap()[..], b"AAAA");
}

#[tokio::test]
async fn test_concurrent_retrievals_respect_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let mut files = Vec::new();
    for i in 0..12u8 {
        let data = pattern(100 + i as usize * 10, i);
        files.push(create_file(&temp_dir, &format!("f{}", i), &data).await);
    }
    let capacity = 600;
    let cache = Arc::new(FileCache::new(capacity));

    let mut handles = Vec::new();
    for round in 0..4 {
        for (i, metadata) in files.iter().enumerate() {
            let cache = cache.clone();
            let metadata = metadata.clone();
            let expected_len = metadata.size as usize;
            handles.push(tokio::spawn(async move {
                let content = cache.retrieve_file(&metadata).await.unwrap();
                assert_eq!(content.len(), expected_len, "round {} file {}", round, i);
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats().unwrap();
    assert!(stats.current_size <= capacity);

    let keys = cache.keys().unwrap();
    let unique: std::collections::HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    assert_eq!(keys.len() as u64, stats.entries_count);

    let resident: u64 = files
        .iter()
        .filter(|m| keys.contains(&m.path))
        .map(|m| m.size)
        .sum();
    assert_eq!(resident, stats.current_size);
}
