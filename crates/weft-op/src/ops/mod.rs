//! Built-in operator implementations.
//!
//! One module per operator family. Everything here goes through the
//! capability surface in the crate root; none of these types are special
//! to the evaluator.

pub mod arith;
pub mod base64;
pub mod boolean;
pub mod calc;
pub mod cmp;
pub mod concat;
pub mod defer;
pub mod empty;
pub mod file;
pub mod grab;
pub mod inject;
pub mod join;
pub mod keys;
pub mod null;
pub mod param;
pub mod prune;
pub mod shuffle;
pub mod stringify;
pub mod ternary;
pub mod vault;

use std::sync::Arc;

use weft_par::Expr;
use weft_util::{Error, Pos, Result};

use crate::Registry;

/// Register every built-in operator.
pub fn register_defaults(registry: &Registry) {
    registry.register(Arc::new(grab::Grab));
    registry.register(Arc::new(concat::Concat));
    registry.register(Arc::new(join::Join));
    registry.register(Arc::new(keys::Keys));
    registry.register(Arc::new(stringify::Stringify));
    registry.register(Arc::new(base64::Base64Encode));
    registry.register(Arc::new(base64::Base64Decode));
    registry.register(Arc::new(file::FileOp));
    registry.register(Arc::new(calc::Calc));
    registry.register(Arc::new(param::Param));
    registry.register(Arc::new(defer::Defer));
    registry.register(Arc::new(inject::Inject));
    registry.register(Arc::new(prune::Prune));
    registry.register(Arc::new(vault::Vault));
    registry.register(Arc::new(empty::Empty));
    registry.register(Arc::new(null::NullOp));
    registry.register(Arc::new(shuffle::Shuffle));
    registry.register(Arc::new(ternary::Ternary));
    registry.register(Arc::new(boolean::And));
    registry.register(Arc::new(boolean::Not));

    for symbol in ["+", "-", "*", "/", "%"] {
        registry.register(Arc::new(arith::Arith::new(symbol)));
    }
    for symbol in ["==", "!=", "<", "<=", ">", ">="] {
        registry.register(Arc::new(cmp::Cmp::new(symbol)));
    }
}

/// Require an exact argument count.
pub(crate) fn expect_args(name: &str, args: &[Expr], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Error::type_error(
            args.first().map(|a| a.pos()).unwrap_or(Pos::DUMMY),
            format!(
                "`{}` takes {} argument{}, got {}",
                name,
                count,
                if count == 1 { "" } else { "s" },
                args.len()
            ),
        ))
    }
}

/// Require at least `count` arguments.
pub(crate) fn expect_min_args(name: &str, args: &[Expr], count: usize) -> Result<()> {
    if args.len() >= count {
        Ok(())
    } else {
        Err(Error::type_error(
            args.first().map(|a| a.pos()).unwrap_or(Pos::DUMMY),
            format!(
                "`{}` needs at least {} argument{}, got {}",
                name,
                count,
                if count == 1 { "" } else { "s" },
                args.len()
            ),
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use weft_tree::Value;
    use weft_util::Result;

    use crate::{OpContext, Registry};

    /// Parse and resolve one expression against a YAML tree.
    pub(crate) fn eval(tree_yaml: &str, source: &str) -> Result<Value> {
        let registry = Registry::with_defaults();
        let tree: Value = serde_yaml::from_str(tree_yaml).unwrap();
        let ctx = OpContext::for_tests(&tree, &registry);
        let expr = weft_par::parse_expression(source, &registry)?;
        ctx.resolve(&expr)
    }

    /// Evaluate and unwrap, for the happy paths.
    pub(crate) fn eval_ok(tree_yaml: &str, source: &str) -> Value {
        eval(tree_yaml, source)
            .unwrap_or_else(|e| panic!("`{}` failed to evaluate: {}", source, e))
    }
}
