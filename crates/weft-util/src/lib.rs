//! weft-util - Shared atoms for the weft engine.
//!
//! This crate holds the pieces every other engine crate leans on:
//! positions, the error taxonomy and its renderer, string interning,
//! buffer pools, and the engine configuration schema.

pub mod config;
pub mod error;
pub mod intern;
pub mod pool;
pub mod span;

pub use config::{
    AutoTuneConfig, CacheConfig, ConcurrencyConfig, ConfigError, ConfigResult, EngineConfig,
    EnvOverrides, IoConfig, MemoryConfig, ParserKind, ParsingConfig, RateLimit, WarmingStrategy,
    KNOWN_EXPENSIVE_OPERATORS,
};
pub use error::{render_error, Error, Result};
pub use intern::{Interner, InternerStats, INTERNER};
pub use pool::{BufferPool, PoolStats};
pub use span::Pos;
