//! `shuffle` - a randomly permuted copy of a list.
//!
//! Not idempotent, so never eligible for parallel waves or memoization.

use rand::seq::SliceRandom;

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Result};

use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Response};

pub struct Shuffle;

impl Operator for Shuffle {
    fn name(&self) -> &str {
        "shuffle"
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("shuffle", args, 1)?;

        let mut items = Vec::new();
        for arg in args {
            match ctx.resolve(arg)? {
                Value::List(list) => items.extend(list),
                Value::Map(_) => {
                    return Err(Error::type_error(
                        arg.pos(),
                        "`shuffle` works on lists, not maps",
                    ))
                }
                value => items.push(value),
            }
        }

        items.shuffle(&mut rand::thread_rng());
        Ok(Response::Replace(Value::List(items)))
    }
}
