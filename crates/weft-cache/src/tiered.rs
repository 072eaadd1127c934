//! Two-tier cache façade.
//!
//! Lookups go L1 then L2; L2 hits are promoted back into L1, and entries
//! evicted from L1 are demoted to L2. `get_or_compute` guarantees
//! at-most-one concurrent computation per key: concurrent callers for
//! the same key coalesce onto the single pending computation and all
//! observe its result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use weft_util::{Error, Pos};

use crate::disk::{DiskCache, SyncHandle};
use crate::l1::{L1Cache, TierStats};

/// Object-safe view of a lower tier.
trait SecondTier<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn put(&self, key: &str, value: V);
    fn stats(&self) -> TierStats;
    fn sync_count(&self) -> u64;
}

impl<V> SecondTier<V> for DiskCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        DiskCache::get(self, key)
    }

    fn put(&self, key: &str, value: V) {
        DiskCache::put(self, key, value)
    }

    fn stats(&self) -> TierStats {
        DiskCache::stats(self)
    }

    fn sync_count(&self) -> u64 {
        DiskCache::sync_count(self)
    }
}

/// A computation other callers are waiting on.
struct Pending<V> {
    result: Mutex<Option<Result<V, String>>>,
    done: Condvar,
}

impl<V> Pending<V> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

/// Combined counters for both tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub l1: TierStats,
    pub l2: Option<TierStats>,
    /// L2 hits copied back into L1.
    pub promotions: u64,
    /// L1 evictions pushed down into L2.
    pub demotions: u64,
    /// Callers that waited on another caller's computation.
    pub coalesced_waits: u64,
    /// Completed background syncs of the disk tier.
    pub syncs: u64,
}

/// The tiered cache.
pub struct TieredCache<V> {
    l1: L1Cache<V>,
    l2: Option<Arc<dyn SecondTier<V>>>,
    pending: Mutex<HashMap<String, Arc<Pending<V>>>>,

    promotions: AtomicU64,
    demotions: Arc<AtomicU64>,
    coalesced: AtomicU64,

    /// Keeps the background sync thread alive for the cache's lifetime.
    _sync: Option<SyncHandle>,
}

impl<V: Clone + Send + Sync + 'static> TieredCache<V> {
    /// An in-memory-only cache.
    pub fn memory_only(capacity: usize, ttl: Duration) -> Self {
        Self {
            l1: L1Cache::new(capacity, ttl),
            l2: None,
            pending: Mutex::new(HashMap::new()),
            promotions: AtomicU64::new(0),
            demotions: Arc::new(AtomicU64::new(0)),
            coalesced: AtomicU64::new(0),
            _sync: None,
        }
    }

    /// Look up a key, promoting L2 hits into L1.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.l1.get(key) {
            return Some(value);
        }

        let l2 = self.l2.as_ref()?;
        let value = l2.get(key)?;
        self.promotions.fetch_add(1, Ordering::Relaxed);
        self.l1.insert(key, value.clone(), 0);
        Some(value)
    }

    /// Insert into L1 (and, through demotion on eviction, eventually L2).
    pub fn insert(&self, key: &str, value: V, size_bytes: usize) {
        self.l1.insert(key, value, size_bytes);
    }

    /// Look up `key`, computing and caching the value on a miss.
    ///
    /// At most one caller computes; the rest block until that
    /// computation finishes and observe the same outcome. Failed
    /// computations are not cached.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> weft_util::Result<V>
    where
        F: FnOnce() -> weft_util::Result<(V, usize)>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        enum Role<V> {
            Owner(Arc<Pending<V>>),
            Waiter(Arc<Pending<V>>),
        }

        let role = {
            let mut pending = self.pending.lock();
            if let Some(slot) = pending.get(key) {
                Role::Waiter(Arc::clone(slot))
            } else {
                // Double-check under the pending lock: the computation we
                // would have waited for may have just completed.
                if let Some(value) = self.get(key) {
                    return Ok(value);
                }
                let slot = Arc::new(Pending::new());
                pending.insert(key.to_string(), Arc::clone(&slot));
                Role::Owner(slot)
            }
        };

        match role {
            Role::Owner(slot) => {
                let outcome = compute();
                let result = match outcome {
                    Ok((value, size_bytes)) => {
                        self.insert(key, value.clone(), size_bytes);
                        Ok(value)
                    }
                    Err(err) => Err(err.to_string()),
                };

                {
                    let mut shared = slot.result.lock();
                    *shared = Some(result.clone());
                    slot.done.notify_all();
                }
                self.pending.lock().remove(key);

                result.map_err(|message| Error::evaluation(Pos::DUMMY, message))
            }
            Role::Waiter(slot) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "coalescing onto pending computation");
                let mut shared = slot.result.lock();
                while shared.is_none() {
                    slot.done.wait(&mut shared);
                }
                match shared.clone().unwrap() {
                    Ok(value) => Ok(value),
                    Err(message) => Err(Error::evaluation(Pos::DUMMY, message)),
                }
            }
        }
    }

    /// Drop all in-memory entries. Disk records are untouched.
    pub fn clear_memory(&self) {
        self.l1.clear();
    }

    /// Combined counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1: self.l1.stats(),
            l2: self.l2.as_ref().map(|l2| l2.stats()),
            promotions: self.promotions.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced.load(Ordering::Relaxed),
            syncs: self.l2.as_ref().map(|l2| l2.sync_count()).unwrap_or(0),
        }
    }
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// A cache backed by a disk tier under `dir`.
    ///
    /// L1 evictions demote into the disk tier, which a background thread
    /// flushes every `sync_interval`.
    pub fn with_disk(
        l1_capacity: usize,
        l2_capacity: usize,
        ttl: Duration,
        dir: impl Into<PathBuf>,
        sync_interval: Duration,
    ) -> std::io::Result<Self> {
        let disk = Arc::new(DiskCache::open(dir, l2_capacity, ttl)?);
        let sync = disk.spawn_sync(sync_interval);

        let demotions = Arc::new(AtomicU64::new(0));
        let hook_disk = Arc::clone(&disk);
        let hook_count = Arc::clone(&demotions);
        let l1 = L1Cache::new(l1_capacity, ttl).with_eviction_hook(Box::new(
            move |key, value: &V| {
                hook_count.fetch_add(1, Ordering::Relaxed);
                hook_disk.put(key, value.clone());
            },
        ));

        Ok(Self {
            l1,
            l2: Some(disk),
            pending: Mutex::new(HashMap::new()),
            promotions: AtomicU64::new(0),
            demotions,
            coalesced: AtomicU64::new(0),
            _sync: Some(sync),
        })
    }
}
