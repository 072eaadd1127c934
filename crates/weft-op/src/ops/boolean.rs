//! Boolean operators `&&` and `!`.
//!
//! Truthiness follows the document model: nil and false are false,
//! everything else is true. `&&` does not resolve its right operand when
//! the left is false.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::Result;

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct And;

impl Operator for And {
    fn name(&self) -> &str {
        "&&"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("&&", args, 2)?;

        if !ctx.resolve(&args[0])?.is_truthy() {
            return Ok(Response::Replace(Value::Bool(false)));
        }
        let rhs = ctx.resolve(&args[1])?;
        Ok(Response::Replace(Value::Bool(rhs.is_truthy())))
    }
}

pub struct Not;

impl Operator for Not {
    fn name(&self) -> &str {
        "!"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("!", args, 1)?;
        let value = ctx.resolve(&args[0])?;
        Ok(Response::Replace(Value::Bool(!value.is_truthy())))
    }
}
