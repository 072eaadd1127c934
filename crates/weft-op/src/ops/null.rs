//! `null` - produce nil.
//!
//! The bare words `nil` and `null` already parse as literals; the
//! operator form exists for hosts that dispatch by name.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::Result;

use crate::{OpContext, Operator, Response};

pub struct NullOp;

impl Operator for NullOp {
    fn name(&self) -> &str {
        "null"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, _ctx: &OpContext<'_>, _args: &[Expr]) -> Result<Response> {
        Ok(Response::Replace(Value::Null))
    }
}
