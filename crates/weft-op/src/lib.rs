//! weft-op - Operators: the verbs of the expression language.
//!
//! An [`Operator`] declares when it runs ([`Phase`]), which tree
//! locations a call depends on, and how to produce a [`Response`] from
//! its arguments. Implementations register in a [`Registry`]; the
//! evaluator dispatches through it and external hosts may register
//! operators of their own.
//!
//! The registry is process-wide but treated as configuration: tests swap
//! an operator with [`Registry::replace_scoped`] and the previous
//! implementation is restored when the guard drops.

pub mod ctx;
pub mod external;
pub mod fingerprint;
pub mod ops;

pub use ctx::{EnvLookup, MapEnv, OpContext, ProcessEnv};
pub use external::{
    call_with_retries, FileLoader, RetryPolicy, SecretResolver, StaticSecrets, StdFileLoader,
};
pub use fingerprint::opcall_fingerprint;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use weft_par::{Expr, OperatorNames};
use weft_tree::{Cursor, Value};
use weft_util::{Result, INTERNER};

/// When an operator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// During document assembly (`inject`, `prune`).
    Merge,
    /// After assembly, before evaluation (`param` validation).
    Param,
    /// On the assembled tree.
    Eval,
}

/// What an operator call asks the evaluator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Write this value at the destination.
    Replace(Value),
    /// Merge this mapping into the destination's parent mapping.
    Inject(IndexMap<String, Value>),
    /// Leave the destination untouched; the call may be re-queued.
    Keep,
}

/// An operator implementation.
pub trait Operator: Send + Sync {
    /// The name calls use.
    fn name(&self) -> &str;

    /// Called once at registration.
    fn setup(&self) {}

    /// When this operator runs.
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    /// True when calls may run on a parallel wave: idempotent, free of
    /// side effects except at the destination, and thread-safe in any
    /// external calls.
    fn is_safe(&self) -> bool {
        false
    }

    /// Tree locations a call with these arguments depends on. `auto`
    /// carries operator-specific additions computed by the evaluator.
    fn dependencies(&self, ctx: &OpContext<'_>, args: &[Expr], auto: &[Cursor]) -> Vec<Cursor> {
        default_dependencies(ctx, args, auto)
    }

    /// Execute the call.
    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response>;
}

/// Dependencies from explicit references plus recursive descent into
/// nested calls and alternation chains.
pub fn default_dependencies(
    ctx: &OpContext<'_>,
    args: &[Expr],
    auto: &[Cursor],
) -> Vec<Cursor> {
    let mut deps: Vec<Cursor> = auto.to_vec();
    for arg in args {
        collect_dependencies(ctx, arg, &mut deps);
    }
    deps
}

fn collect_dependencies(ctx: &OpContext<'_>, expr: &Expr, deps: &mut Vec<Cursor>) {
    match expr {
        Expr::Reference { cursor, .. } => {
            // Named sequence indices resolve against the current tree
            // where possible; unresolvable paths keep their raw form.
            let canonical = cursor.canonicalize(ctx.tree).unwrap_or_else(|_| cursor.clone());
            deps.push(canonical);
        }
        Expr::Call { name, args, .. } => {
            let nested = ctx.registry().get(name);
            deps.extend(nested.dependencies(ctx, args, &[]));
        }
        Expr::Or { alternatives, .. } => {
            // Every alternative counts for scheduling; short-circuit
            // applies to evaluation only.
            for alt in alternatives {
                collect_dependencies(ctx, alt, deps);
            }
        }
        Expr::Literal { .. } | Expr::EnvVar { .. } => {}
    }
}

/// Sentinel returned for unknown names, so callers can hold an operator
/// without branching on presence. Running it reports the unknown name.
pub struct NullOperator {
    requested: String,
}

impl NullOperator {
    /// Sentinel for the given unknown name.
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
        }
    }
}

impl Operator for NullOperator {
    fn name(&self) -> &str {
        &self.requested
    }

    fn dependencies(&self, _ctx: &OpContext<'_>, _args: &[Expr], _auto: &[Cursor]) -> Vec<Cursor> {
        Vec::new()
    }

    fn run(&self, _ctx: &OpContext<'_>, _args: &[Expr]) -> Result<Response> {
        Err(weft_util::Error::evaluation(
            weft_util::Pos::DUMMY,
            format!("unknown operator `{}`", self.requested),
        ))
    }
}

/// Named operator table. Names are interned; the same handful repeats
/// across every expression in a document set.
pub struct Registry {
    ops: RwLock<HashMap<Arc<str>, Arc<dyn Operator>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            ops: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding every built-in operator.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        ops::register_defaults(&registry);
        registry
    }

    /// Register an operator under its own name, running its `setup`.
    /// Returns the previous implementation, if any.
    pub fn register(&self, op: Arc<dyn Operator>) -> Option<Arc<dyn Operator>> {
        tracing::trace!(operator = op.name(), "registering operator");
        op.setup();
        let name = INTERNER.intern(op.name());
        self.ops.write().insert(name, op)
    }

    /// The operator registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.ops.read().get(name).cloned()
    }

    /// The operator registered under `name`, or the null sentinel.
    pub fn get(&self, name: &str) -> Arc<dyn Operator> {
        self.lookup(name)
            .unwrap_or_else(|| Arc::new(NullOperator::new(name)))
    }

    /// True when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.ops.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.read().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    /// Swap in an operator for the guard's lifetime; the previous
    /// implementation (or absence) is restored when the guard drops.
    pub fn replace_scoped(&self, op: Arc<dyn Operator>) -> ReplaceGuard<'_> {
        let name = INTERNER.intern(op.name());
        let previous = self.register(op);
        ReplaceGuard {
            registry: self,
            name,
            previous,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorNames for Registry {
    fn contains_operator(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Restores a replaced operator on drop.
pub struct ReplaceGuard<'a> {
    registry: &'a Registry,
    name: Arc<str>,
    previous: Option<Arc<dyn Operator>>,
}

impl Drop for ReplaceGuard<'_> {
    fn drop(&mut self) {
        let mut ops = self.registry.ops.write();
        match self.previous.take() {
            Some(previous) => {
                ops.insert(Arc::clone(&self.name), previous);
            }
            None => {
                ops.remove(&self.name);
            }
        }
    }
}

static GLOBAL_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_defaults);

/// The process-wide registry with the built-in operators.
///
/// Convenience over an injected [`Registry`]; the evaluator takes a
/// registry reference and this is merely the default argument.
pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
