//! weft-eval - The dependency-driven evaluator.
//!
//! Evaluation runs phases over the tree (Merge, then Param, then Eval).
//! Each phase scans the tree for `(( … ))` strings, parses them through
//! the cache, asks every call for its dependencies, orders the calls
//! topologically (document order breaks ties, so side effects are
//! predictable), and executes them, substituting results back into the
//! tree. Cycles are detected up front and reported with every cursor on
//! the cycle.
//!
//! The parallel path partitions a phase's calls into dependency waves
//! and runs safe waves on a bounded worker pool over copy-on-write
//! snapshots; see [`waves`].

pub mod graph;
pub mod metrics;
pub mod waves;

pub use graph::DepGraph;
pub use metrics::{Histogram, InstrumentedFiles, InstrumentedSecrets, Metrics};
pub use waves::CancelToken;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use weft_cache::TieredCache;
use weft_op::ops::inject::injectable_destination;
use weft_op::{
    EnvLookup, FileLoader, OpContext, Operator, Phase, Registry, Response, RetryPolicy,
    SecretResolver, StaticSecrets, StdFileLoader,
};
use weft_par::{extract_payload, parse_with, Expr};
use weft_tree::{merge_documents, Cursor, DeepMerger, Merger, Value};
use weft_util::{EngineConfig, EnvOverrides, Error, ParserKind, Pos, Result};

static PROCESS_ENV: weft_op::ProcessEnv = weft_op::ProcessEnv;
static STD_FILES: StdFileLoader = StdFileLoader::new();
static NO_SECRETS: StaticSecrets = StaticSecrets::empty();

/// An operator call pinned to its destination in the tree.
pub struct Opcall {
    /// Where the result lands.
    pub dest: Cursor,
    /// The parsed expression. Plain references and literals are calls
    /// too, in the degenerate sense: they resolve and replace.
    pub expr: Expr,
    /// The payload text, for diagnostics.
    pub src: String,
}

impl Opcall {
    /// The operator name, for expressions that are calls.
    pub fn operator_name(&self) -> Option<&str> {
        match &self.expr {
            Expr::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The phase this call runs in.
    pub fn phase(&self, registry: &Registry) -> Phase {
        match self.operator_name() {
            Some(name) => registry.get(name).phase(),
            None => Phase::Eval,
        }
    }

    /// True when the whole expression, nested calls included, is
    /// eligible for parallel execution.
    pub fn is_safe(&self, registry: &Registry) -> bool {
        expr_is_safe(registry, &self.expr)
    }

    /// The tree locations this call waits on.
    pub fn dependencies(&self, ctx: &OpContext<'_>) -> Vec<Cursor> {
        match &self.expr {
            Expr::Call { name, args, .. } => ctx.registry().get(name).dependencies(ctx, args, &[]),
            other => weft_op::default_dependencies(ctx, std::slice::from_ref(other), &[]),
        }
    }

    /// Execute the call against a tree view.
    pub fn execute(&self, ctx: &OpContext<'_>) -> Result<Response> {
        match &self.expr {
            Expr::Call { name, args, .. } => ctx.registry().get(name).run(ctx, args),
            other => Ok(Response::Replace(ctx.resolve(other)?)),
        }
    }
}

fn expr_is_safe(registry: &Registry, expr: &Expr) -> bool {
    match expr {
        Expr::Literal { .. } | Expr::Reference { .. } | Expr::EnvVar { .. } => true,
        Expr::Call { name, args, .. } => match registry.lookup(name) {
            Some(op) => op.is_safe() && args.iter().all(|a| expr_is_safe(registry, a)),
            None => false,
        },
        Expr::Or { alternatives, .. } => {
            alternatives.iter().all(|a| expr_is_safe(registry, a))
        }
    }
}

/// The evaluator.
///
/// # Examples
///
/// ```
/// use weft_eval::Evaluator;
/// use weft_op::Registry;
/// use weft_tree::Value;
///
/// let registry = Registry::with_defaults();
/// let mut tree: Value = serde_yaml::from_str(
///     "a: (( grab b ))\nb: value\n",
/// ).unwrap();
///
/// Evaluator::new(&registry).evaluate(&mut tree).unwrap();
/// let expected: Value = serde_yaml::from_str("a: value\nb: value\n").unwrap();
/// assert_eq!(tree, expected);
/// ```
pub struct Evaluator<'a> {
    registry: &'a Registry,
    env: &'a dyn EnvLookup,

    files: InstrumentedFiles<'a>,
    secrets: InstrumentedSecrets<'a>,

    pub(crate) config: EngineConfig,
    parser: ParserKind,
    retry: RetryPolicy,
    pub(crate) parallel: bool,

    pub(crate) metrics: Arc<Metrics>,
    parse_cache: TieredCache<Expr>,
    op_cache: TieredCache<Value>,
    scan_pool: weft_util::BufferPool<(Cursor, String)>,

    only: Vec<Cursor>,
    skip_eval: bool,
    pub(crate) max_errors: usize,
    pub(crate) cancel: CancelToken,
}

impl<'a> Evaluator<'a> {
    /// An evaluator over the given registry with default configuration.
    /// Environment toggles (`PARALLEL`, `LEGACY_PARSER`, …) are applied
    /// on top.
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// An evaluator with explicit configuration (environment toggles
    /// still apply on top).
    pub fn with_config(registry: &'a Registry, mut config: EngineConfig) -> Self {
        let overrides = EnvOverrides::capture();
        overrides.apply(&mut config);

        let metrics = Arc::new(Metrics::with_interner_capacity(
            config.memory.string_interning.max_entries,
        ));
        let ttl = Duration::from_secs(config.parsing.memoization_ttl_secs);

        Self {
            registry,
            env: &PROCESS_ENV,
            files: InstrumentedFiles::new(&STD_FILES, Arc::clone(&metrics)),
            secrets: InstrumentedSecrets::new(&NO_SECRETS, Arc::clone(&metrics)),
            parser: overrides.parser.unwrap_or_default(),
            retry: RetryPolicy::from_io(&config.io),
            parallel: config.parallel,
            parse_cache: TieredCache::memory_only(config.parsing.memoization_cache_size, ttl),
            op_cache: TieredCache::memory_only(
                config.cache.l1_size,
                Duration::from_secs(config.cache.ttl_secs),
            ),
            scan_pool: weft_util::BufferPool::new(config.memory.token_pool_size),
            config,
            metrics,
            only: Vec::new(),
            skip_eval: false,
            max_errors: 1,
            cancel: CancelToken::new(),
        }
    }

    /// Use an environment source other than the process environment.
    pub fn with_env(mut self, env: &'a dyn EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Use a file collaborator other than the filesystem.
    pub fn with_files(mut self, files: &'a dyn FileLoader) -> Self {
        self.files = InstrumentedFiles::new(files, Arc::clone(&self.metrics));
        self
    }

    /// Use a secret collaborator.
    pub fn with_secrets(mut self, secrets: &'a dyn SecretResolver) -> Self {
        self.secrets = InstrumentedSecrets::new(secrets, Arc::clone(&self.metrics));
        self
    }

    /// Restrict evaluation to the given subpaths.
    pub fn with_only(mut self, paths: Vec<Cursor>) -> Self {
        self.only = paths;
        self
    }

    /// Skip the Eval phase entirely (merge-only workflows).
    pub fn skip_eval(mut self) -> Self {
        self.skip_eval = true;
        self
    }

    /// Continue past recoverable errors, aggregating up to `budget`.
    pub fn with_error_budget(mut self, budget: usize) -> Self {
        self.max_errors = budget.max(1);
        self
    }

    /// Force the parallel path on or off, overriding configuration.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The injected metrics collector.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Counters of the parse-result cache.
    pub fn parse_cache_stats(&self) -> weft_cache::CacheStats {
        self.parse_cache.stats()
    }

    /// Counters of the operator-result cache.
    pub fn operator_cache_stats(&self) -> weft_cache::CacheStats {
        self.op_cache.stats()
    }

    /// A handle that stops evaluation when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Merge documents in order, then evaluate the result.
    pub fn evaluate_documents(&self, documents: Vec<Value>) -> Result<Value> {
        let mut tree = merge_documents(&DeepMerger, documents)?;
        self.evaluate(&mut tree)?;
        Ok(tree)
    }

    /// Run all phases over the tree, in place.
    pub fn evaluate(&self, tree: &mut Value) -> Result<()> {
        let start = Instant::now();
        let mut errors = Vec::new();

        for phase in [Phase::Merge, Phase::Param, Phase::Eval] {
            if phase == Phase::Eval && self.skip_eval {
                debug!("skipping eval phase");
                break;
            }
            if errors.len() >= self.max_errors {
                break;
            }
            self.run_phase(tree, phase, &mut errors).map_err(|err| {
                self.metrics.record_error(err.kind());
                err
            })?;
        }

        self.metrics.record_eval(start.elapsed());

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.pop().unwrap()),
            _ => Err(Error::Multi { errors }),
        }
    }

    fn run_phase(&self, tree: &mut Value, phase: Phase, errors: &mut Vec<Error>) -> Result<()> {
        let opcalls = self.scan(tree, phase, errors);
        if opcalls.is_empty() {
            return Ok(());
        }
        debug!(?phase, calls = opcalls.len(), "running phase");

        let deps: Vec<Vec<Cursor>> = opcalls
            .iter()
            .map(|oc| {
                let ctx = self.context(tree, oc.dest.clone());
                oc.dependencies(&ctx)
            })
            .collect();
        let dests: Vec<Cursor> = opcalls.iter().map(|oc| oc.dest.clone()).collect();

        let graph = DepGraph::build(&dests, &deps);
        graph.check_cycles(&dests)?;

        let parallel_eligible = self.parallel
            && phase == Phase::Eval
            && opcalls.len() >= self.config.concurrency.min_ops_for_parallel;

        if parallel_eligible {
            waves::execute_parallel(self, tree, &opcalls, &graph, errors)?;
        } else {
            let order = graph.topo_order();
            self.execute_sequential(tree, &opcalls, &order, errors)?;
        }

        if phase == Phase::Merge {
            self.prune_pass(tree, &opcalls);
        }
        Ok(())
    }

    /// Walk the tree and collect this phase's calls, in document order.
    fn scan(&self, tree: &Value, phase: Phase, errors: &mut Vec<Error>) -> Vec<Opcall> {
        let mut payloads = self.scan_pool.get();
        collect_payloads(tree, Cursor::root(), &mut payloads);

        let mut opcalls = Vec::new();
        for (dest, payload) in payloads.drain(..) {
            if errors.len() >= self.max_errors {
                break;
            }

            let expr = match self.parse_payload(&payload) {
                Ok(expr) => expr,
                Err(err) => {
                    self.metrics.record_error(err.kind());
                    errors.push(err.chained(
                        Pos::DUMMY,
                        format!("in expression at `{}`", dest),
                    ));
                    continue;
                }
            };

            let opcall = Opcall {
                dest,
                expr,
                src: payload,
            };
            if opcall.phase(self.registry) != phase {
                continue;
            }
            if phase == Phase::Eval
                && !self.only.is_empty()
                && !self.only.iter().any(|p| p.contains(&opcall.dest))
            {
                trace!(dest = %opcall.dest, "filtered out by only-paths");
                continue;
            }
            opcalls.push(opcall);
        }
        self.scan_pool.put(payloads);
        opcalls
    }

    /// Parse a payload through the memoization cache. Cache misses parse
    /// directly so syntax errors keep their kind.
    fn parse_payload(&self, payload: &str) -> Result<Expr> {
        if let Some(expr) = self.parse_cache.get(payload) {
            return Ok(expr);
        }

        let start = Instant::now();
        let expr = parse_with(payload, self.registry, self.parser)?;
        self.metrics.record_parse(start.elapsed());
        self.parse_cache.insert(payload, expr.clone(), payload.len());
        Ok(expr)
    }

    pub(crate) fn context<'t>(&'t self, tree: &'t Value, here: Cursor) -> OpContext<'t> {
        OpContext::new(
            tree,
            here,
            self.registry,
            self.env,
            &self.files,
            &self.secrets,
            self.retry,
        )
    }

    pub(crate) fn registry(&self) -> &Registry {
        self.registry
    }

    fn execute_sequential(
        &self,
        tree: &mut Value,
        opcalls: &[Opcall],
        order: &[usize],
        errors: &mut Vec<Error>,
    ) -> Result<()> {
        for &idx in order {
            if self.cancel.is_cancelled() {
                return Err(Error::evaluation(Pos::DUMMY, "evaluation cancelled"));
            }
            if errors.len() >= self.max_errors {
                break;
            }

            let oc = &opcalls[idx];
            let outcome = {
                let ctx = self.context(tree, oc.dest.clone());
                self.run_opcall(oc, &ctx)
            };

            match outcome.and_then(|response| self.apply(tree, oc, response)) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    self.metrics.record_error(err.kind());
                    return Err(err);
                }
                Err(err) => {
                    self.metrics.record_error(err.kind());
                    errors.push(annotate(oc, err));
                }
            }
        }
        Ok(())
    }

    /// Execute one call, with memoization for configured operators.
    pub(crate) fn run_opcall(&self, oc: &Opcall, ctx: &OpContext<'_>) -> Result<Response> {
        let label = oc.operator_name().unwrap_or("expr").to_string();
        let start = Instant::now();
        let result = self.run_opcall_inner(oc, ctx);
        self.metrics.record_opcall(&label, start.elapsed());
        result
    }

    fn run_opcall_inner(&self, oc: &Opcall, ctx: &OpContext<'_>) -> Result<Response> {
        let Some(name) = oc.operator_name() else {
            return oc.execute(ctx);
        };

        let memoizable = self
            .config
            .parsing
            .expensive_operators
            .iter()
            .any(|n| n == name);
        if !memoizable {
            return oc.execute(ctx);
        }

        let Expr::Call { args, .. } = &oc.expr else {
            return oc.execute(ctx);
        };
        let deps = oc.dependencies(ctx);
        let key = weft_op::opcall_fingerprint(name, args, ctx.tree, &deps);

        if let Some(value) = self.op_cache.get(&key) {
            trace!(operator = name, "memoized result");
            return Ok(Response::Replace(value));
        }

        let response = oc.execute(ctx)?;
        if let Response::Replace(value) = &response {
            let size = serde_size(value);
            self.op_cache.insert(&key, value.clone(), size);
        }
        Ok(response)
    }

    /// Write a response back into the tree.
    pub(crate) fn apply(&self, tree: &mut Value, oc: &Opcall, response: Response) -> Result<()> {
        match response {
            Response::Replace(value) => oc.dest.set(tree, value),
            Response::Keep => Ok(()),
            Response::Inject(injected) => {
                if !injectable_destination(&oc.dest) {
                    return Err(Error::type_error(
                        oc.expr.pos(),
                        "`inject` must sit under a map key",
                    ));
                }
                let parent_cursor = oc.dest.parent().ok_or_else(|| {
                    Error::type_error(oc.expr.pos(), "`inject` cannot run at the root")
                })?;

                oc.dest.delete(tree)?;

                let mut parent = match parent_cursor.resolve(tree)? {
                    Value::Map(map) => map.clone(),
                    other => {
                        return Err(Error::type_error(
                            oc.expr.pos(),
                            format!("`inject` destination parent is {}", other.type_name()),
                        ))
                    }
                };

                // Entries already present in the parent win over the
                // injected defaults; parent key order is preserved.
                for (key, value) in injected {
                    match parent.get_mut(&key) {
                        Some(slot) => {
                            let existing = std::mem::take(slot);
                            let mut base = value;
                            DeepMerger.merge(&mut base, existing)?;
                            *slot = base;
                        }
                        None => {
                            parent.insert(key, value);
                        }
                    }
                }

                parent_cursor.set(tree, Value::Map(parent))
            }
        }
    }

    /// Remove every prune destination, deepest paths first.
    fn prune_pass(&self, tree: &mut Value, opcalls: &[Opcall]) {
        let mut dests: Vec<&Cursor> = opcalls
            .iter()
            .filter(|oc| oc.operator_name() == Some("prune"))
            .map(|oc| &oc.dest)
            .collect();
        dests.sort_by_key(|c| std::cmp::Reverse(c.len()));

        for dest in dests {
            debug!(dest = %dest, "pruning");
            if let Err(err) = dest.delete(tree) {
                trace!(dest = %dest, error = %err, "prune target already gone");
            }
        }
    }
}

/// Wrap a call failure with its destination.
pub(crate) fn annotate(oc: &Opcall, err: Error) -> Error {
    err.chained(
        oc.expr.pos(),
        format!("could not evaluate `{}`", oc.dest),
    )
}

fn collect_payloads(node: &Value, at: Cursor, out: &mut Vec<(Cursor, String)>) {
    match node {
        Value::Map(map) => {
            for (key, child) in map {
                collect_payloads(child, at.child_key(key), out);
            }
        }
        Value::List(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_payloads(child, at.child_index(index), out);
            }
        }
        Value::String(s) => {
            if let Some(payload) = extract_payload(s) {
                out.push((at, payload.to_string()));
            }
        }
        _ => {}
    }
}

fn serde_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}
