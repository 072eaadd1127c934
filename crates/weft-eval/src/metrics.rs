//! Metrics collection.
//!
//! The collector is injected into the evaluator; a host that wants a
//! process-wide instance wraps one in a `static`. Counters are atomics
//! and durations land in fixed-bucket histograms, so recording from
//! parallel waves never blocks on the hot path (the per-operator and
//! error tables take a short lock).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use weft_op::{FileLoader, SecretResolver};
use weft_util::{Interner, Result};

/// Histogram bucket upper bounds, in microseconds.
const BUCKET_BOUNDS: [u64; 8] = [10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000, u64::MAX];

/// A fixed-bucket duration histogram.
#[derive(Debug, Default)]
pub struct Histogram {
    buckets: [AtomicU64; 8],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl Histogram {
    /// Record one observation.
    pub fn observe(&self, duration: Duration) {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;
        let slot = BUCKET_BOUNDS.iter().position(|&b| micros <= b).unwrap_or(7);
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Observation count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean observation, or zero with no data.
    pub fn mean(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.sum_micros.load(Ordering::Relaxed) / count)
    }

    /// Cumulative bucket counts paired with their bounds.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        let mut cumulative = 0;
        BUCKET_BOUNDS
            .iter()
            .enumerate()
            .map(|(i, &bound)| {
                cumulative += self.buckets[i].load(Ordering::Relaxed);
                (bound, cumulative)
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CallStat {
    count: u64,
    micros: u64,
}

/// The injected metrics collector.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,

    /// Expression parses (cache misses only).
    pub parse_duration: Histogram,
    /// Whole-tree evaluations.
    pub eval_duration: Histogram,

    /// Operator and subsystem names repeat for every call; table keys
    /// are interned so the hot path stops allocating after warm-up.
    names: Interner,
    per_operator: Mutex<FxHashMap<Arc<str>, CallStat>>,
    external: Mutex<FxHashMap<Arc<str>, CallStat>>,
    errors: Mutex<FxHashMap<&'static str, u64>>,

    opcalls: AtomicU64,
    running_now: AtomicUsize,
    concurrency_high_water: AtomicUsize,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::with_interner_capacity(4096)
    }
}

impl Metrics {
    /// A fresh collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector whose name interner stores at most `capacity`
    /// entries.
    pub fn with_interner_capacity(capacity: usize) -> Self {
        Self {
            started: Instant::now(),
            parse_duration: Histogram::default(),
            eval_duration: Histogram::default(),
            names: Interner::new(capacity),
            per_operator: Mutex::new(FxHashMap::default()),
            external: Mutex::new(FxHashMap::default()),
            errors: Mutex::new(FxHashMap::default()),
            opcalls: AtomicU64::new(0),
            running_now: AtomicUsize::new(0),
            concurrency_high_water: AtomicUsize::new(0),
        }
    }

    /// Record a completed parse.
    pub fn record_parse(&self, duration: Duration) {
        self.parse_duration.observe(duration);
    }

    /// Record a completed whole-tree evaluation.
    pub fn record_eval(&self, duration: Duration) {
        self.eval_duration.observe(duration);
    }

    /// Record one operator call.
    pub fn record_opcall(&self, name: &str, duration: Duration) {
        self.opcalls.fetch_add(1, Ordering::Relaxed);
        let key = self.names.intern(name);
        let mut table = self.per_operator.lock();
        let stat = table.entry(key).or_default();
        stat.count += 1;
        stat.micros += duration.as_micros() as u64;
    }

    /// Record one external-collaborator call.
    pub fn record_external(&self, subsystem: &str, duration: Duration) {
        let key = self.names.intern(subsystem);
        let mut table = self.external.lock();
        let stat = table.entry(key).or_default();
        stat.count += 1;
        stat.micros += duration.as_micros() as u64;
    }

    /// Record an error by its kind label.
    pub fn record_error(&self, kind: &'static str) {
        *self.errors.lock().entry(kind).or_insert(0) += 1;
    }

    /// Track a worker entering execution; pairs with [`Metrics::worker_done`].
    pub fn worker_started(&self) {
        let now = self.running_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.concurrency_high_water.fetch_max(now, Ordering::SeqCst);
    }

    /// Track a worker leaving execution.
    pub fn worker_done(&self) {
        self.running_now.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of simultaneously running operator calls seen.
    pub fn concurrency_high_water(&self) -> usize {
        self.concurrency_high_water.load(Ordering::SeqCst)
    }

    /// Operator calls per second since the collector was created.
    pub fn ops_per_second(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.opcalls.load(Ordering::Relaxed) as f64 / elapsed
    }

    /// Total operator calls.
    pub fn opcall_count(&self) -> u64 {
        self.opcalls.load(Ordering::Relaxed)
    }

    /// Call count and total duration for one operator.
    pub fn operator_stats(&self, name: &str) -> Option<(u64, Duration)> {
        self.per_operator
            .lock()
            .get(name)
            .map(|s| (s.count, Duration::from_micros(s.micros)))
    }

    /// Call count and total duration for one external subsystem.
    pub fn external_stats(&self, subsystem: &str) -> Option<(u64, Duration)> {
        self.external
            .lock()
            .get(subsystem)
            .map(|s| (s.count, Duration::from_micros(s.micros)))
    }

    /// Error count for one kind label.
    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors.lock().get(kind).copied().unwrap_or(0)
    }
}

/// File loader that reports call durations to the collector.
pub struct InstrumentedFiles<'a> {
    inner: &'a dyn FileLoader,
    metrics: Arc<Metrics>,
}

impl<'a> InstrumentedFiles<'a> {
    pub fn new(inner: &'a dyn FileLoader, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

impl FileLoader for InstrumentedFiles<'_> {
    fn load(&self, path: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.inner.load(path);
        self.metrics.record_external("file", start.elapsed());
        result
    }
}

/// Secret resolver that reports call durations to the collector.
pub struct InstrumentedSecrets<'a> {
    inner: &'a dyn SecretResolver,
    metrics: Arc<Metrics>,
}

impl<'a> InstrumentedSecrets<'a> {
    pub fn new(inner: &'a dyn SecretResolver, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

impl SecretResolver for InstrumentedSecrets<'_> {
    fn resolve(&self, path: &str) -> Result<weft_tree::Value> {
        let start = Instant::now();
        let result = self.inner.resolve(path);
        self.metrics.record_external("vault", start.elapsed());
        result
    }
}
