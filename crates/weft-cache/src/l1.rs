//! In-memory cache tier.
//!
//! Entry-count-bounded mapping with per-entry TTL and an LRU-like
//! eviction discipline: when full, the entry with the oldest access time
//! is evicted. Expired entries are removed on access and counted as
//! misses, so a hit never returns a value past its TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

/// Per-entry bookkeeping.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    created_at: Instant,
    last_access: Instant,
    hit_count: u64,
    size_bytes: usize,
    ttl: Option<Duration>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.created_at) >= ttl,
            None => false,
        }
    }
}

/// Counters for one cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Entries currently held.
    pub entries: u64,
    /// Approximate bytes currently held.
    pub size_bytes: u64,
}

/// Called with evicted entries, e.g. to demote them to a lower tier.
pub type EvictionHook<V> = Box<dyn Fn(&str, &V) + Send + Sync>;

/// The in-memory tier.
pub struct L1Cache<V> {
    inner: Mutex<IndexMap<String, Entry<V>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
    on_evict: Option<EvictionHook<V>>,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> L1Cache<V> {
    /// Create a tier holding at most `capacity` entries. A zero TTL
    /// means entries never expire.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(IndexMap::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            default_ttl: (!ttl.is_zero()).then_some(ttl),
            on_evict: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Install a hook that observes evicted entries.
    pub fn with_eviction_hook(mut self, hook: EvictionHook<V>) -> Self {
        self.on_evict = Some(hook);
        self
    }

    /// Look up a key. Expired entries are removed and counted as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                inner.shift_remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                entry.last_access = now;
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a value with the default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V, size_bytes: usize) {
        self.insert_with_ttl(key, value, size_bytes, self.default_ttl)
    }

    /// Insert a value with an explicit TTL override.
    pub fn insert_with_ttl(
        &self,
        key: impl Into<String>,
        value: V,
        size_bytes: usize,
        ttl: Option<Duration>,
    ) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if !inner.contains_key(&key) && inner.len() >= self.capacity {
            self.evict_coldest(&mut inner);
        }

        inner.insert(
            key,
            Entry {
                value,
                created_at: now,
                last_access: now,
                hit_count: 0,
                size_bytes,
                ttl,
            },
        );
    }

    /// Evict the entry with the oldest access time.
    fn evict_coldest(&self, inner: &mut IndexMap<String, Entry<V>>) {
        let coldest = inner
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());

        if let Some(key) = coldest {
            if let Some(entry) = inner.shift_remove(&key) {
                trace!(key = %key, "evicting cache entry");
                self.evictions.fetch_add(1, Ordering::Relaxed);
                if let Some(hook) = &self.on_evict {
                    hook(&key, &entry.value);
                }
            }
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> TierStats {
        let inner = self.inner.lock();
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: inner.len() as u64,
            size_bytes: inner.values().map(|e| e.size_bytes as u64).sum(),
        }
    }
}
