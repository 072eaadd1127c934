//! Execution context handed to operators.
//!
//! An [`OpContext`] gives an operator read access to the tree, the
//! destination cursor, the registry (for nested calls), environment
//! lookups, and the external collaborators. Argument resolution lives
//! here: operators resolve the arguments they need, when they need them,
//! which is what makes `&&`, `?:` and `||` lazy.

use weft_par::Expr;
use weft_tree::{Cursor, Value};
use weft_util::{Error, Result};

use crate::external::{FileLoader, RetryPolicy, SecretResolver, StaticSecrets, StdFileLoader};
use crate::{Registry, Response};

/// Environment-variable access, injectable for tests.
pub trait EnvLookup: Send + Sync {
    /// The value of the variable, if set.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed map of variables, for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub std::collections::HashMap<String, String>);

impl MapEnv {
    /// Build from `(name, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl EnvLookup for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Everything an operator call can see.
pub struct OpContext<'a> {
    /// The current tree (read view).
    pub tree: &'a Value,
    /// The destination cursor of the running call.
    pub here: Cursor,

    registry: &'a Registry,
    env: &'a dyn EnvLookup,
    files: &'a dyn FileLoader,
    secrets: &'a dyn SecretResolver,
    retry: RetryPolicy,
}

impl<'a> OpContext<'a> {
    /// Assemble a context.
    pub fn new(
        tree: &'a Value,
        here: Cursor,
        registry: &'a Registry,
        env: &'a dyn EnvLookup,
        files: &'a dyn FileLoader,
        secrets: &'a dyn SecretResolver,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            tree,
            here,
            registry,
            env,
            files,
            secrets,
            retry,
        }
    }

    /// A root-destination context over default collaborators, for tests.
    pub fn for_tests(tree: &'a Value, registry: &'a Registry) -> Self {
        static ENV: ProcessEnv = ProcessEnv;
        static FILES: StdFileLoader = StdFileLoader::new();
        static SECRETS: StaticSecrets = StaticSecrets::empty();
        Self {
            tree,
            here: Cursor::root(),
            registry,
            env: &ENV,
            files: &FILES,
            secrets: &SECRETS,
            retry: RetryPolicy::none(),
        }
    }

    /// The registry in effect for nested dispatch.
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// The retry policy for external calls.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// The file collaborator.
    pub fn files(&self) -> &dyn FileLoader {
        self.files
    }

    /// The secret collaborator.
    pub fn secrets(&self) -> &dyn SecretResolver {
        self.secrets
    }

    /// A context like this one but with another destination.
    pub fn at(&self, here: Cursor) -> OpContext<'a> {
        OpContext {
            tree: self.tree,
            here,
            registry: self.registry,
            env: self.env,
            files: self.files,
            secrets: self.secrets,
            retry: self.retry,
        }
    }

    /// Resolve one expression to a value.
    ///
    /// References resolve against the tree (named sequence indices
    /// included); nested calls dispatch through the registry; an
    /// alternation chain returns its first alternative that resolves to
    /// a non-nil value.
    pub fn resolve(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),

            Expr::Reference { cursor, pos } => {
                cursor.resolve(self.tree).cloned().map_err(|_| {
                    Error::reference(*pos, cursor.to_string(), "could not be found in the tree")
                })
            }

            Expr::EnvVar { name, pos } => match self.env.get(name) {
                Some(value) => Ok(Value::String(value)),
                None => Err(Error::reference(
                    *pos,
                    format!("${}", name),
                    "environment variable is not set",
                )),
            },

            Expr::Call { name, args, pos } => {
                let op = self.registry.get(name);
                match op.run(self, args) {
                    Ok(Response::Replace(value)) => Ok(value),
                    Ok(Response::Inject(_)) => Err(Error::type_error(
                        *pos,
                        format!("`{}` cannot be used inside an expression", name),
                    )),
                    Ok(Response::Keep) => Err(Error::type_error(
                        *pos,
                        format!("`{}` cannot be used inside an expression", name),
                    )),
                    Err(err) => Err(err.chained(*pos, format!("in call to `{}`", name))),
                }
            }

            Expr::Or { alternatives, pos } => {
                let mut saw_nil = false;
                let mut last_error = None;
                for alt in alternatives {
                    match self.resolve(alt) {
                        Ok(Value::Null) => saw_nil = true,
                        Ok(value) => return Ok(value),
                        Err(err) => last_error = Some(err),
                    }
                }
                // A chain that reached a nil alternative is nil; a chain
                // where nothing resolved reports its last failure.
                if saw_nil {
                    Ok(Value::Null)
                } else {
                    match last_error {
                        Some(err) => Err(err.chained(*pos, "no alternative could be resolved")),
                        None => Ok(Value::Null),
                    }
                }
            }
        }
    }

    /// Resolve every argument, left to right.
    pub fn resolve_all(&self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.resolve(arg)).collect()
    }

    /// Resolve an argument and require a scalar's textual form.
    pub fn resolve_text(&self, arg: &Expr) -> Result<String> {
        let value = self.resolve(arg)?;
        value.scalar_text().ok_or_else(|| {
            Error::type_error(
                arg.pos(),
                format!("expected a scalar, got {}", value.type_name()),
            )
        })
    }
}
