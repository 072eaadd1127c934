//! `join` - glue list elements (or variadic scalars) with a separator.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Result};

use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Response};

pub struct Join;

impl Operator for Join {
    fn name(&self) -> &str {
        "join"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("join", args, 2)?;

        let separator = ctx.resolve_text(&args[0])?;

        // `join sep list` takes the list's elements; `join sep a b …`
        // takes the arguments themselves.
        let values: Vec<Value> = if args.len() == 2 {
            match ctx.resolve(&args[1])? {
                Value::List(items) => items,
                value => vec![value],
            }
        } else {
            ctx.resolve_all(&args[1..])?
        };

        let mut pieces = Vec::with_capacity(values.len());
        for value in values {
            let text = value.scalar_text().ok_or_else(|| {
                Error::type_error(
                    args[0].pos(),
                    format!("`join` cannot stringify a {}", value.type_name()),
                )
            })?;
            pieces.push(text);
        }

        Ok(Response::Replace(Value::String(pieces.join(&separator))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};

    #[test]
    fn test_join_list() {
        assert_eq!(
            eval_ok("l:\n  - a\n  - b\n  - c\n", r#"join "," l"#),
            Value::from("a,b,c")
        );
    }

    #[test]
    fn test_join_variadic() {
        assert_eq!(
            eval_ok("x: 1\ny: 2\n", r#"join "-" x y"#),
            Value::from("1-2")
        );
    }

    #[test]
    fn test_join_numbers_in_list() {
        assert_eq!(
            eval_ok("l:\n  - 1\n  - 2\n", r#"join ":" l"#),
            Value::from("1:2")
        );
    }

    #[test]
    fn test_join_list_of_maps_errors() {
        assert!(eval("l:\n  - k: v\n", r#"join "," l"#).is_err());
    }

    #[test]
    fn test_join_needs_separator_and_input() {
        assert!(eval("l: []\n", r#"join ",""#).is_err());
    }
}
