//! `stringify` - the serialized textual form of a value.
//!
//! Strings pass through untouched and nil stays nil; everything else is
//! rendered the way the document serializer would write it.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Stringify;

impl Operator for Stringify {
    fn name(&self) -> &str {
        "stringify"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("stringify", args, 1)?;

        let value = ctx.resolve(&args[0])?;
        let rendered = match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s),
            other => {
                let text = serde_yaml::to_string(&other).map_err(|err| {
                    Error::evaluation(args[0].pos(), format!("cannot serialize value: {}", err))
                })?;
                Value::String(text.trim_end_matches('\n').to_string())
            }
        };
        Ok(Response::Replace(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::eval_ok;

    #[test]
    fn test_string_passes_through() {
        assert_eq!(eval_ok("s: plain\n", "stringify s"), Value::from("plain"));
    }

    #[test]
    fn test_nil_stays_nil() {
        assert_eq!(eval_ok("n: ~\n", "stringify n"), Value::Null);
    }

    #[test]
    fn test_map_serializes() {
        let value = eval_ok("m:\n  a: 1\n  b: two\n", "stringify m");
        assert_eq!(value, Value::from("a: 1\nb: two"));
    }

    #[test]
    fn test_number_serializes() {
        assert_eq!(eval_ok("n: 42\n", "stringify n"), Value::from("42"));
    }
}
