//! Structural fingerprints for operator memoization.
//!
//! A memoized result is only valid while the call's inputs are
//! unchanged, so the cache key covers the operator name, the canonical
//! form of every argument, and the current contents of each dependency
//! subtree. Any edit under a dependency changes the fingerprint and
//! misses the cache.

use std::hash::{Hash, Hasher};

use ahash::AHasher;

use weft_par::Expr;
use weft_tree::{Cursor, Value};

/// Fingerprint an operator call against the current tree.
///
/// # Examples
///
/// ```
/// use weft_op::opcall_fingerprint;
/// use weft_par::Expr;
/// use weft_tree::Value;
///
/// let tree: Value = serde_yaml::from_str("a: 1").unwrap();
/// let args = [Expr::literal("x")];
/// let one = opcall_fingerprint("concat", &args, &tree, &[]);
/// let two = opcall_fingerprint("concat", &args, &tree, &[]);
/// assert_eq!(one, two);
/// ```
pub fn opcall_fingerprint(name: &str, args: &[Expr], tree: &Value, deps: &[Cursor]) -> String {
    let mut hasher = AHasher::default();

    name.hash(&mut hasher);
    for arg in args {
        arg.to_source().hash(&mut hasher);
    }

    for dep in deps {
        dep.to_string().hash(&mut hasher);
        match dep.resolve(tree) {
            Ok(value) => match serde_json::to_string(value) {
                Ok(json) => json.hash(&mut hasher),
                Err(_) => "unserializable".hash(&mut hasher),
            },
            Err(_) => "missing".hash(&mut hasher),
        }
    }

    format!("{}:{:016x}", name, hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_stable_for_same_inputs() {
        let t = tree("a: 1\nb: 2\n");
        let deps = [Cursor::parse("a").unwrap()];
        let args = [Expr::literal(1i64)];
        assert_eq!(
            opcall_fingerprint("grab", &args, &t, &deps),
            opcall_fingerprint("grab", &args, &t, &deps)
        );
    }

    #[test]
    fn test_changes_with_dependency_contents() {
        let before = tree("a: 1\n");
        let after = tree("a: 2\n");
        let deps = [Cursor::parse("a").unwrap()];
        let args = [Expr::literal(1i64)];
        assert_ne!(
            opcall_fingerprint("grab", &args, &before, &deps),
            opcall_fingerprint("grab", &args, &after, &deps)
        );
    }

    #[test]
    fn test_changes_with_operator_and_args() {
        let t = tree("a: 1\n");
        let args_one = [Expr::literal(1i64)];
        let args_two = [Expr::literal(2i64)];
        assert_ne!(
            opcall_fingerprint("grab", &args_one, &t, &[]),
            opcall_fingerprint("grab", &args_two, &t, &[])
        );
        assert_ne!(
            opcall_fingerprint("grab", &args_one, &t, &[]),
            opcall_fingerprint("keys", &args_one, &t, &[])
        );
    }

    #[test]
    fn test_unrelated_edits_do_not_change_fingerprint() {
        let before = tree("a: 1\nb: 2\n");
        let after = tree("a: 1\nb: 99\n");
        let deps = [Cursor::parse("a").unwrap()];
        let args: [Expr; 0] = [];
        assert_eq!(
            opcall_fingerprint("grab", &args, &before, &deps),
            opcall_fingerprint("grab", &args, &after, &deps)
        );
    }
}
