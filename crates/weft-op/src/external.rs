//! External collaborator seams.
//!
//! The engine consumes files and secrets through traits; concrete
//! clients (remote key-value stores, cloud parameter services) live in
//! the host. The in-tree implementations are the plain filesystem loader
//! and an in-memory secret map for tests. [`call_with_retries`] is the
//! shared retry/backoff discipline every external call goes through.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use weft_tree::Value;
use weft_util::{Error, IoConfig, Result};

/// Reads file contents for the `file` operator.
pub trait FileLoader: Send + Sync {
    /// The contents of `path` as a string.
    fn load(&self, path: &str) -> Result<String>;
}

/// Filesystem-backed loader, optionally rooted at a base directory.
#[derive(Debug, Clone, Default)]
pub struct StdFileLoader {
    base_dir: Option<PathBuf>,
}

impl StdFileLoader {
    /// Loader resolving paths as given.
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Loader resolving relative paths under `base`.
    pub fn rooted(base: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base.into()),
        }
    }
}

impl FileLoader for StdFileLoader {
    fn load(&self, path: &str) -> Result<String> {
        let full = match &self.base_dir {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        };
        std::fs::read_to_string(&full).map_err(|err| Error::External {
            subsystem: "file".to_string(),
            message: format!("{}: {}", full.display(), err),
            attempts: 1,
        })
    }
}

/// Resolves external secret references for the `vault` operator.
pub trait SecretResolver: Send + Sync {
    /// The secret stored at `path`.
    fn resolve(&self, path: &str) -> Result<Value>;
}

/// A fixed secret map; the test double for the secret backend.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets(BTreeMap<String, Value>);

impl StaticSecrets {
    /// A resolver with no secrets.
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from `(path, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::from(v)))
                .collect(),
        )
    }
}

impl SecretResolver for StaticSecrets {
    fn resolve(&self, path: &str) -> Result<Value> {
        self.0.get(path).cloned().ok_or_else(|| Error::External {
            subsystem: "vault".to_string(),
            message: format!("secret `{}` not found", path),
            attempts: 1,
        })
    }
}

/// Retry discipline for one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-call timeout handed to the collaborator client.
    pub timeout: Duration,
    /// Retries after the first failed attempt.
    pub retries: u32,
    /// Base backoff; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no waiting.
    pub const fn none() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Derive the policy from I/O configuration.
    pub fn from_io(io: &IoConfig) -> Self {
        Self {
            timeout: Duration::from_secs(io.timeout_secs),
            retries: io.retries,
            backoff: Duration::from_millis(io.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `call` under the retry policy.
///
/// The call receives the 1-based attempt number. Retriable failures are
/// external errors only; every other error kind aborts immediately. When
/// the budget is exhausted the final error reports the attempt count.
pub fn call_with_retries<T>(
    policy: RetryPolicy,
    subsystem: &str,
    mut call: impl FnMut(u32) -> Result<T>,
) -> Result<T> {
    let attempts = policy.retries + 1;
    let mut last = None;

    for attempt in 1..=attempts {
        match call(attempt) {
            Ok(value) => return Ok(value),
            Err(err @ Error::External { .. }) => {
                debug!(subsystem, attempt, error = %err, "external call failed");
                last = Some(err);
                if attempt < attempts && !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff * attempt);
                }
            }
            Err(other) => return Err(other),
        }
    }

    match last {
        Some(Error::External {
            message, ..
        }) => Err(Error::External {
            subsystem: subsystem.to_string(),
            message,
            attempts,
        }),
        _ => Err(Error::External {
            subsystem: subsystem.to_string(),
            message: "no attempts were made".to_string(),
            attempts: 0,
        }),
    }
}
