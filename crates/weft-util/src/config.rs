//! Engine configuration schema.
//!
//! The engine consumes a validated [`EngineConfig`]; producing it (file
//! loading, layering, CLI flags) belongs to the host. `validate()` checks
//! the cross-field constraints the engine relies on, and
//! [`EnvOverrides::capture`] reads the handful of environment toggles
//! that change engine behavior directly.

use serde::Deserialize;
use thiserror::Error;

/// Operators the cache layer is allowed to memoize.
///
/// Configuration may select any subset of these; unknown names are a
/// validation error.
pub const KNOWN_EXPENSIVE_OPERATORS: &[&str] = &[
    "vault",
    "file",
    "aws",
    "secret",
    "concat",
    "join",
    "grab",
    "static_ips",
    "calc",
    "defer",
    "load",
];

/// Errors produced by configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field violated its lower or upper bound.
    #[error("invalid `{field}`: {message}")]
    OutOfRange { field: &'static str, message: String },

    /// A field referenced a name the engine does not know.
    #[error("unknown name in `{field}`: {name}")]
    UnknownName { field: &'static str, name: String },
}

/// Result alias for configuration validation.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Cache warming strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarmingStrategy {
    /// Re-warm the most frequently hit keys.
    #[default]
    Frequency,
    /// Re-warm keys matching recently observed access patterns.
    Pattern,
    /// Blend of both.
    Hybrid,
}

/// Tiered-cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheConfig {
    /// Entry capacity of the in-memory tier.
    #[serde(default = "default_l1_size")]
    pub l1_size: usize,

    /// Entry capacity of the disk tier. Zero disables the tier.
    #[serde(default = "default_l2_size")]
    pub l2_size: usize,

    /// Per-entry time-to-live in seconds. Zero means no expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How evicted-but-hot entries are re-primed.
    #[serde(default)]
    pub warming: WarmingStrategy,

    /// Interval between background flushes of dirty disk-tier state.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

/// Rate limiting applied to external calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateLimit {
    /// Sustained requests per second.
    #[serde(default = "default_rps")]
    pub requests_per_sec: u32,

    /// Burst allowance; at most ten times the sustained rate.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

/// Worker-pool settings for the parallel execution path.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConcurrencyConfig {
    /// Worker threads for wave execution.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Task queue depth; must hold at least one task per worker.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Seconds an idle worker lingers before parking.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Rate limiting for external calls made from workers.
    #[serde(default)]
    pub rate_limit: RateLimit,

    /// Fewer operator calls than this run sequentially even when the
    /// parallel path is enabled.
    #[serde(default = "default_min_ops")]
    pub min_ops_for_parallel: usize,
}

/// String-interning settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterningConfig {
    /// Ceiling on stored interner entries.
    #[serde(default = "default_intern_entries")]
    pub max_entries: usize,
}

/// Memory-related knobs. Advisory sizing, never correctness limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryConfig {
    /// Advisory heap ceiling in megabytes.
    #[serde(default = "default_max_heap_mb")]
    pub max_heap_mb: usize,

    /// Idle buffers retained by the token-list pool.
    #[serde(default = "default_pool_size")]
    pub token_pool_size: usize,

    /// Idle buffers retained by the argument-list pool.
    #[serde(default = "default_pool_size")]
    pub arg_pool_size: usize,

    /// Idle buffers retained by the byte-buffer pool.
    #[serde(default = "default_pool_size")]
    pub byte_pool_size: usize,

    /// String-interning settings.
    #[serde(default)]
    pub string_interning: InterningConfig,
}

/// Expression parsing and memoization settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsingConfig {
    /// Entry capacity of the parse-result cache.
    #[serde(default = "default_memo_size")]
    pub memoization_cache_size: usize,

    /// Time-to-live of memoized parses in seconds.
    #[serde(default = "default_ttl_secs")]
    pub memoization_ttl_secs: u64,

    /// Operators whose results are memoized. Must be a subset of
    /// [`KNOWN_EXPENSIVE_OPERATORS`].
    #[serde(default = "default_expensive_operators")]
    pub expensive_operators: Vec<String>,
}

/// External I/O settings for collaborator calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IoConfig {
    /// Connection pool size for external clients.
    #[serde(default = "default_io_pool")]
    pub pool: usize,

    /// Per-call timeout in seconds.
    #[serde(default = "default_io_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a failed call.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff between retries, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Window in seconds within which identical external requests are
    /// deduplicated.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

/// Self-tuning settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoTuneConfig {
    /// Seconds between workload analyses.
    #[serde(default = "default_analysis_interval_secs")]
    pub analysis_interval_secs: u64,

    /// Fractional change in a metric required before adjusting.
    #[serde(default = "default_adjustment_threshold")]
    pub adjustment_threshold: f64,

    /// Ceiling on adjustments per hour.
    #[serde(default = "default_max_adjustments")]
    pub max_adjustments_per_hour: u32,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub concurrency: ConcurrencyConfig,
    pub memory: MemoryConfig,
    pub parsing: ParsingConfig,
    pub io: IoConfig,
    pub auto_tune: AutoTuneConfig,

    /// Run the wave-parallel evaluator. Overridden by the `PARALLEL`
    /// environment variable when set.
    pub parallel: bool,
}

fn default_l1_size() -> usize {
    256
}

fn default_l2_size() -> usize {
    4096
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sync_interval_secs() -> u64 {
    30
}

fn default_rps() -> u32 {
    50
}

fn default_burst() -> u32 {
    100
}

/// Default worker count tracks the machine.
///
/// `num_cpus::get()` is always at least 1, so the lower bound holds
/// without clamping.
fn default_max_workers() -> usize {
    num_cpus::get()
}

fn default_queue_size() -> usize {
    default_max_workers() * 4
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_min_ops() -> usize {
    10
}

fn default_intern_entries() -> usize {
    65_536
}

fn default_max_heap_mb() -> usize {
    512
}

fn default_pool_size() -> usize {
    64
}

fn default_memo_size() -> usize {
    1024
}

fn default_expensive_operators() -> Vec<String> {
    KNOWN_EXPENSIVE_OPERATORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_io_pool() -> usize {
    4
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_dedup_window_secs() -> u64 {
    5
}

fn default_analysis_interval_secs() -> u64 {
    300
}

fn default_adjustment_threshold() -> f64 {
    0.2
}

fn default_max_adjustments() -> u32 {
    6
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_size: default_l1_size(),
            l2_size: default_l2_size(),
            ttl_secs: default_ttl_secs(),
            warming: WarmingStrategy::default(),
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_sec: default_rps(),
            burst: default_burst(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_size: default_queue_size(),
            idle_timeout_secs: default_idle_timeout_secs(),
            rate_limit: RateLimit::default(),
            min_ops_for_parallel: default_min_ops(),
        }
    }
}

impl Default for InterningConfig {
    fn default() -> Self {
        Self {
            max_entries: default_intern_entries(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_heap_mb: default_max_heap_mb(),
            token_pool_size: default_pool_size(),
            arg_pool_size: default_pool_size(),
            byte_pool_size: default_pool_size(),
            string_interning: InterningConfig::default(),
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            memoization_cache_size: default_memo_size(),
            memoization_ttl_secs: default_ttl_secs(),
            expensive_operators: default_expensive_operators(),
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            pool: default_io_pool(),
            timeout_secs: default_io_timeout_secs(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: default_analysis_interval_secs(),
            adjustment_threshold: default_adjustment_threshold(),
            max_adjustments_per_hour: default_max_adjustments(),
        }
    }
}

impl EngineConfig {
    /// Validate all sections and their cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_cache()?;
        self.validate_concurrency()?;
        self.validate_memory()?;
        self.validate_parsing()?;
        self.validate_io()?;
        self.validate_auto_tune()?;
        Ok(())
    }

    fn validate_cache(&self) -> ConfigResult<()> {
        if self.cache.l1_size < 10 {
            return Err(ConfigError::OutOfRange {
                field: "cache.l1_size",
                message: format!("must be at least 10, got {}", self.cache.l1_size),
            });
        }
        if self.cache.l2_size != 0 && self.cache.l2_size < self.cache.l1_size {
            return Err(ConfigError::OutOfRange {
                field: "cache.l2_size",
                message: format!(
                    "must be 0 (disabled) or at least l1_size ({}), got {}",
                    self.cache.l1_size, self.cache.l2_size
                ),
            });
        }
        Ok(())
    }

    fn validate_concurrency(&self) -> ConfigResult<()> {
        let c = &self.concurrency;
        if c.max_workers < 1 {
            return Err(ConfigError::OutOfRange {
                field: "concurrency.max_workers",
                message: "must be at least 1".to_string(),
            });
        }
        if c.queue_size < c.max_workers {
            return Err(ConfigError::OutOfRange {
                field: "concurrency.queue_size",
                message: format!(
                    "must be at least max_workers ({}), got {}",
                    c.max_workers, c.queue_size
                ),
            });
        }
        let limit = &c.rate_limit;
        if limit.requests_per_sec > 0 && limit.burst > limit.requests_per_sec.saturating_mul(10) {
            return Err(ConfigError::OutOfRange {
                field: "concurrency.rate_limit.burst",
                message: format!(
                    "must be at most 10x requests_per_sec ({}), got {}",
                    limit.requests_per_sec, limit.burst
                ),
            });
        }
        Ok(())
    }

    fn validate_memory(&self) -> ConfigResult<()> {
        if self.memory.max_heap_mb < 32 {
            return Err(ConfigError::OutOfRange {
                field: "memory.max_heap_mb",
                message: format!("must be at least 32, got {}", self.memory.max_heap_mb),
            });
        }
        Ok(())
    }

    fn validate_parsing(&self) -> ConfigResult<()> {
        for name in &self.parsing.expensive_operators {
            if !KNOWN_EXPENSIVE_OPERATORS.contains(&name.as_str()) {
                return Err(ConfigError::UnknownName {
                    field: "parsing.expensive_operators",
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_io(&self) -> ConfigResult<()> {
        if self.io.pool < 1 {
            return Err(ConfigError::OutOfRange {
                field: "io.pool",
                message: "must be at least 1".to_string(),
            });
        }
        if self.io.timeout_secs < 1 {
            return Err(ConfigError::OutOfRange {
                field: "io.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_auto_tune(&self) -> ConfigResult<()> {
        let t = &self.auto_tune;
        if t.analysis_interval_secs < 60 {
            return Err(ConfigError::OutOfRange {
                field: "auto_tune.analysis_interval_secs",
                message: format!("must be at least 60, got {}", t.analysis_interval_secs),
            });
        }
        if !(0.0..=1.0).contains(&t.adjustment_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "auto_tune.adjustment_threshold",
                message: format!("must be within [0, 1], got {}", t.adjustment_threshold),
            });
        }
        Ok(())
    }
}

/// Parser selection, controlled by environment toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserKind {
    /// Full precedence-climbing parser.
    #[default]
    Enhanced,
    /// Minimal head-operator parser.
    Legacy,
}

/// Environment toggles the engine honors directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `PARALLEL`: forces the parallel execution path on or off.
    pub parallel: Option<bool>,
    /// `ENHANCED_PARSER` / `LEGACY_PARSER`: parser selection.
    pub parser: Option<ParserKind>,
    /// `DEBUG`: verbose diagnostic output.
    pub debug: bool,
    /// `TRACE`: very verbose diagnostic output.
    pub trace: bool,
}

impl EnvOverrides {
    /// Read the toggles from the process environment.
    pub fn capture() -> Self {
        let parser = match (bool_env("ENHANCED_PARSER"), bool_env("LEGACY_PARSER")) {
            (_, Some(true)) => Some(ParserKind::Legacy),
            (Some(true), _) => Some(ParserKind::Enhanced),
            (Some(false), _) => Some(ParserKind::Legacy),
            _ => None,
        };
        Self {
            parallel: bool_env("PARALLEL"),
            parser,
            debug: bool_env("DEBUG").unwrap_or(false),
            trace: bool_env("TRACE").unwrap_or(false),
        }
    }

    /// Apply the captured toggles on top of a configuration.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
    }

    /// The tracing filter directive selected by `DEBUG`/`TRACE`, or
    /// `None` when neither is set and the subscriber's own default
    /// (e.g. `RUST_LOG`) should win. `TRACE` outranks `DEBUG`.
    pub fn log_filter(&self) -> Option<&'static str> {
        if self.trace {
            Some("trace")
        } else if self.debug {
            Some("debug")
        } else {
            None
        }
    }
}

fn bool_env(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}
