//! `keys` - the sorted key list of a mapping.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Keys;

impl Operator for Keys {
    fn name(&self) -> &str {
        "keys"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("keys", args, 1)?;

        match ctx.resolve(&args[0])? {
            Value::Map(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                Ok(Response::Replace(Value::List(
                    keys.into_iter().map(Value::String).collect(),
                )))
            }
            other => Err(Error::type_error(
                args[0].pos(),
                format!("`keys` needs a map, got {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};

    #[test]
    fn test_keys_sorted_ascending() {
        assert_eq!(
            eval_ok("m:\n  b: 1\n  a: 2\n  c: 3\n", "keys m"),
            Value::List(vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c")
            ])
        );
    }

    #[test]
    fn test_keys_of_empty_map() {
        assert_eq!(eval_ok("m: {}\n", "keys m"), Value::List(vec![]));
    }

    #[test]
    fn test_keys_of_list_errors() {
        let err = eval("l:\n  - 1\n", "keys l").unwrap_err();
        assert!(err.to_string().contains("needs a map"));
    }
}
