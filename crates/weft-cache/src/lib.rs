//! weft-cache - Tiered memoization for parse and operator results.
//!
//! Two levels: [`L1Cache`] is an in-memory, entry-count-bounded tier
//! with per-entry TTL; [`DiskCache`] is an optional on-disk tier with
//! its own capacity and TTL plus a background sync thread.
//! [`TieredCache`] combines them with demotion on eviction, promotion on
//! L2 hit, and per-key coalescing of concurrent computations.
//!
//! Clients: the parser memoizes parse results keyed by source text
//! (memory tier only; expression trees are cheap to rebuild), and
//! operators configured as expensive memoize run results keyed by their
//! argument and dependency fingerprints (both tiers).

pub mod disk;
pub mod l1;
pub mod tiered;

pub use disk::{DiskCache, SyncHandle};
pub use l1::{EvictionHook, L1Cache, TierStats};
pub use tiered::{CacheStats, TieredCache};
