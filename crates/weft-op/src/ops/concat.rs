//! `concat` - stringify and concatenate scalars.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::Result;

use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Response};

pub struct Concat;

impl Operator for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("concat", args, 1)?;

        let mut out = String::new();
        for arg in args {
            out.push_str(&ctx.resolve_text(arg)?);
        }
        Ok(Response::Replace(Value::String(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};

    #[test]
    fn test_concat_strings_and_references() {
        assert_eq!(
            eval_ok("env: prod\n", r#"concat "config." env"#),
            Value::from("config.prod")
        );
    }

    #[test]
    fn test_numbers_coerce_to_text() {
        assert_eq!(
            eval_ok("port: 80\n", r#"concat "localhost:" port"#),
            Value::from("localhost:80")
        );
    }

    #[test]
    fn test_nil_contributes_nothing() {
        assert_eq!(
            eval_ok("missing: ~\n", r#"concat "a" missing "b""#),
            Value::from("ab")
        );
    }

    #[test]
    fn test_map_argument_is_a_type_error() {
        let err = eval("m:\n  k: v\n", r#"concat "x" m"#).unwrap_err();
        assert!(err.to_string().contains("scalar"));
    }
}
