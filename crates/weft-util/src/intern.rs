//! String interning for operator names and repeated scalar keys.
//!
//! Documents repeat the same map keys and operator names thousands of
//! times; the interner collapses those to shared allocations. It uses
//! DashMap keyed by an AHash of the string, so concurrent evaluation
//! threads intern without blocking each other.
//!
//! # Thread Safety
//!
//! Fully `Send + Sync`. Lookups are lock-free reads; inserts touch a
//! single shard.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::LazyLock;

use ahash::AHasher;
use dashmap::DashMap;

/// Process-wide interner used for operator names.
///
/// Injected interners are preferred for scoped use (the evaluator owns
/// one sized from configuration); this handle exists for the registry,
/// which is itself process-wide.
pub static INTERNER: LazyLock<Interner> = LazyLock::new(|| Interner::new(usize::MAX));

/// Counters describing interner behavior, for metrics export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InternerStats {
    /// Lookups that found an existing entry.
    pub hits: usize,
    /// Lookups that inserted a new entry.
    pub misses: usize,
    /// Strings returned un-stored because the entry ceiling was reached.
    pub overflows: usize,
    /// Entries currently stored.
    pub entries: usize,
}

/// A bounded, thread-safe string interner.
#[derive(Debug)]
pub struct Interner {
    /// Hash of the string contents to the shared allocation.
    map: DashMap<u64, Arc<str>>,

    /// Ceiling on stored entries. Strings interned past the ceiling are
    /// returned as fresh allocations and not remembered.
    max_entries: usize,

    hits: AtomicUsize,
    misses: AtomicUsize,
    overflows: AtomicUsize,
}

impl Interner {
    /// Create an interner that stores at most `max_entries` strings.
    pub fn new(max_entries: usize) -> Self {
        Self {
            map: DashMap::with_capacity(256),
            max_entries,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            overflows: AtomicUsize::new(0),
        }
    }

    /// Intern a string, returning a shared allocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_util::Interner;
    ///
    /// let interner = Interner::new(1024);
    /// let a = interner.intern("grab");
    /// let b = interner.intern("grab");
    /// assert!(std::sync::Arc::ptr_eq(&a, &b));
    /// ```
    pub fn intern(&self, s: &str) -> Arc<str> {
        let key = hash_str(s);

        if let Some(existing) = self.map.get(&key) {
            // Hash collisions are possible in principle; fall through to a
            // fresh allocation when contents differ.
            if existing.as_ref() == s {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(&existing);
            }
        }

        if self.map.len() >= self.max_entries {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return Arc::from(s);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value: Arc<str> = Arc::from(s);
        self.map.insert(key, Arc::clone(&value));
        value
    }

    /// Current behavior counters.
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            entries: self.map.len(),
        }
    }
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = AHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}
