//! Recycling buffer pools.
//!
//! Tokenizing and parsing thousands of small expressions churns through
//! short-lived vectors. The pools here hand out cleared buffers and take
//! them back instead of allocating fresh ones, with a retention ceiling
//! so a burst of large documents does not pin memory forever.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Counters describing pool behavior, for metrics export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out.
    pub gets: usize,
    /// Buffers returned and retained.
    pub puts: usize,
    /// Gets that had to allocate because the pool was empty.
    pub allocations: usize,
    /// Returns dropped because the pool was at its retention ceiling.
    pub discards: usize,
}

/// A pool of reusable `Vec<T>` buffers.
///
/// # Examples
///
/// ```
/// use weft_util::BufferPool;
///
/// let pool: BufferPool<u8> = BufferPool::new(4);
/// let mut buf = pool.get();
/// buf.extend_from_slice(b"abc");
/// pool.put(buf);
/// assert!(pool.get().is_empty());
/// ```
pub struct BufferPool<T> {
    free: Mutex<Vec<Vec<T>>>,

    /// Maximum buffers retained when idle.
    retain: usize,

    gets: AtomicUsize,
    puts: AtomicUsize,
    allocations: AtomicUsize,
    discards: AtomicUsize,
}

impl<T> BufferPool<T> {
    /// Create a pool retaining at most `retain` idle buffers.
    pub fn new(retain: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(retain.min(64))),
            retain,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            discards: AtomicUsize::new(0),
        }
    }

    /// Take a cleared buffer from the pool, allocating if empty.
    pub fn get(&self) -> Vec<T> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if let Some(buf) = self.free.lock().pop() {
            buf
        } else {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            Vec::new()
        }
    }

    /// Return a buffer to the pool. The buffer is cleared; capacity is kept.
    pub fn put(&self, mut buf: Vec<T>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.retain {
            self.puts.fetch_add(1, Ordering::Relaxed);
            free.push(buf);
        } else {
            self.discards.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of idle buffers currently retained.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Current behavior counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            gets: self.gets.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
        }
    }
}
