//! On-disk cache tier.
//!
//! One JSON record per key, named by a hash of the key, under a single
//! directory. Writes land in a dirty buffer and reach disk on `sync()`,
//! which a background thread calls on a configurable interval. The file
//! layout is internal: records carry a format version and mismatching
//! files are discarded, not migrated.
//!
//! I/O failures are treated as misses and logged; the cache never turns
//! a storage problem into an evaluation failure.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ahash::AHasher;
use crossbeam::channel::{bounded, select, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::l1::TierStats;

/// Record format version. Bumped when the layout changes; old files are
/// dropped on read.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskRecord<V> {
    version: u32,
    key: String,
    created_at: u64,
    ttl_secs: u64,
    value: V,
}

impl<V> DiskRecord<V> {
    fn is_expired(&self, now: u64) -> bool {
        self.ttl_secs != 0 && now.saturating_sub(self.created_at) >= self.ttl_secs
    }
}

/// The disk tier.
pub struct DiskCache<V> {
    dir: PathBuf,
    capacity: usize,
    default_ttl_secs: u64,

    /// Records written but not yet flushed.
    dirty: Mutex<HashMap<String, DiskRecord<V>>>,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    syncs: AtomicU64,
}

impl<V: Serialize + DeserializeOwned + Clone> DiskCache<V> {
    /// Open (creating if needed) a disk tier under `dir`.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize, ttl: Duration) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            capacity: capacity.max(1),
            default_ttl_secs: ttl.as_secs(),
            dirty: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            syncs: AtomicU64::new(0),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }

    /// Look up a key, checking the dirty buffer before disk.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = epoch_secs();

        {
            let mut dirty = self.dirty.lock();
            if let Some(record) = dirty.get(key) {
                if record.is_expired(now) {
                    dirty.remove(key);
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(record.value.clone());
            }
        }

        let path = self.path_for(key);
        let record = match read_record::<V>(&path) {
            Some(record) if record.version == FORMAT_VERSION && record.key == key => record,
            Some(_) => {
                // Stale format or hash collision; drop the file.
                let _ = std::fs::remove_file(&path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if record.is_expired(now) {
            let _ = std::fs::remove_file(&path);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(record.value)
    }

    /// Buffer a record for the next sync.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let record = DiskRecord {
            version: FORMAT_VERSION,
            key: key.clone(),
            created_at: epoch_secs(),
            ttl_secs: self.default_ttl_secs,
            value,
        };
        self.dirty.lock().insert(key, record);
    }

    /// Flush dirty records to disk and sweep over-capacity files.
    pub fn sync(&self) -> io::Result<()> {
        let drained: Vec<(String, DiskRecord<V>)> = self.dirty.lock().drain().collect();
        if !drained.is_empty() {
            trace!(records = drained.len(), "flushing disk cache records");
        }

        for (key, record) in drained {
            let bytes = match serde_json::to_vec(&record) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(key = %key, error = %err, "skipping unserializable cache record");
                    continue;
                }
            };
            std::fs::write(self.path_for(&key), bytes)?;
        }

        self.sweep()?;
        self.syncs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove the oldest files until the tier is within capacity.
    fn sweep(&self) -> io::Result<()> {
        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(UNIX_EPOCH);
                files.push((path, modified));
            }
        }

        if files.len() <= self.capacity {
            return Ok(());
        }

        files.sort_by_key(|(_, modified)| *modified);
        let excess = files.len() - self.capacity;
        for (path, _) in files.into_iter().take(excess) {
            debug!(path = %path.display(), "evicting disk cache record");
            std::fs::remove_file(path)?;
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Number of records on disk plus unflushed ones.
    pub fn len(&self) -> usize {
        let on_disk = std::fs::read_dir(&self.dir)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0);
        on_disk + self.dirty.lock().len()
    }

    /// True when no records exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> TierStats {
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.len() as u64,
            size_bytes: 0,
        }
    }

    /// Number of completed syncs.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

impl<V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static> DiskCache<V> {
    /// Start a background thread that syncs on `interval`. The thread
    /// performs a final sync and exits when the handle drops.
    pub fn spawn_sync(self: &Arc<Self>, interval: Duration) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let cache = Arc::clone(self);

        let thread = std::thread::Builder::new()
            .name("weft-cache-sync".to_string())
            .spawn(move || loop {
                select! {
                    recv(shutdown_rx) -> _ => {
                        if let Err(err) = cache.sync() {
                            debug!(error = %err, "final disk cache sync failed");
                        }
                        break;
                    }
                    default(interval) => {
                        if let Err(err) = cache.sync() {
                            debug!(error = %err, "periodic disk cache sync failed");
                        }
                    }
                }
            })
            .expect("failed to spawn cache sync thread");

        SyncHandle {
            shutdown: shutdown_tx,
            thread: Some(thread),
        }
    }
}

fn read_record<V: DeserializeOwned>(path: &Path) -> Option<DiskRecord<V>> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Owns the background sync thread; dropping it stops the thread after a
/// final flush.
pub struct SyncHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(capacity: usize, ttl: Duration) -> (tempfile::TempDir, DiskCache<String>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path(), capacity, ttl).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_put_get_before_sync() {
        let (_dir, cache) = temp_cache(8, Duration::ZERO);
        cache.put("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_put_sync_get() {
        let (_dir, cache) = temp_cache(8, Duration::ZERO);
        cache.put("k", "v".to_string());
        cache.sync().unwrap();
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.sync_count(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache: DiskCache<String> =
                DiskCache::open(dir.path(), 8, Duration::ZERO).unwrap();
            cache.put("k", "persisted".to_string());
            cache.sync().unwrap();
        }
        let cache: DiskCache<String> = DiskCache::open(dir.path(), 8, Duration::ZERO).unwrap();
        assert_eq!(cache.get("k"), Some("persisted".to_string()));
    }

    #[test]
    fn test_ttl_expiry() {
        let (_dir, cache) = temp_cache(8, Duration::from_secs(1));
        cache.put("k", "v".to_string());
        cache.sync().unwrap();

        // Backdate the record by rewriting it with an old timestamp.
        let path = cache.path_for("k");
        let mut record: DiskRecord<String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        record.created_at -= 60;
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().expirations, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_capacity_sweep() {
        let (_dir, cache) = temp_cache(2, Duration::ZERO);
        for i in 0..5 {
            cache.put(format!("k{}", i), format!("v{}", i));
        }
        cache.sync().unwrap();
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 3);
    }

    #[test]
    fn test_version_mismatch_discards() {
        let (_dir, cache) = temp_cache(8, Duration::ZERO);
        cache.put("k", "v".to_string());
        cache.sync().unwrap();

        let path = cache.path_for("k");
        let mut record: DiskRecord<String> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        record.version = FORMAT_VERSION + 1;
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        assert_eq!(cache.get("k"), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_background_sync_thread() {
        let dir = tempfile::tempdir().unwrap();
        let cache: Arc<DiskCache<String>> =
            Arc::new(DiskCache::open(dir.path(), 8, Duration::ZERO).unwrap());

        let handle = cache.spawn_sync(Duration::from_millis(10));
        cache.put("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.sync_count() >= 1);
        drop(handle);

        // Record reached disk.
        let reopened: DiskCache<String> =
            DiskCache::open(dir.path(), 8, Duration::ZERO).unwrap();
        assert_eq!(reopened.get("k"), Some("v".to_string()));
    }
}
