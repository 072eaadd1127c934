//! The `?:` conditional.
//!
//! Lazy in both branches: only the taken branch is resolved, so a
//! dangling reference in the untaken branch is not an error.

use weft_par::Expr;
use weft_util::Result;

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Ternary;

impl Operator for Ternary {
    fn name(&self) -> &str {
        "?:"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("?:", args, 3)?;

        let taken = if ctx.resolve(&args[0])?.is_truthy() {
            &args[1]
        } else {
            &args[2]
        };
        Ok(Response::Replace(ctx.resolve(taken)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};
    use weft_tree::Value;

    #[test]
    fn test_takes_then_branch() {
        assert_eq!(
            eval_ok("flag: true\na: present\n", "flag ? a : missing.path"),
            Value::from("present")
        );
    }

    #[test]
    fn test_takes_else_branch() {
        assert_eq!(
            eval_ok("flag: false\nb: other\n", "flag ? missing.path : b"),
            Value::from("other")
        );
    }

    #[test]
    fn test_taken_branch_errors_propagate() {
        assert!(eval("flag: true\n", "flag ? missing.path : 1").is_err());
    }

    #[test]
    fn test_chained_ternary_groups_right() {
        assert_eq!(
            eval_ok("a: false\nc: false\n", "a ? 1 : c ? 2 : 3"),
            Value::Int(3)
        );
    }
}
