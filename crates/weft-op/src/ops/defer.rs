//! `defer` - emit the expression text itself, unevaluated.
//!
//! `(( defer grab a.b ))` becomes the literal string `(( grab a.b ))` in
//! the output, for documents that feed a second round of processing.

use weft_par::Expr;
use weft_tree::{Cursor, Value};
use weft_util::Result;

use crate::{OpContext, Operator, Response};

pub struct Defer;

impl Operator for Defer {
    fn name(&self) -> &str {
        "defer"
    }

    fn is_safe(&self) -> bool {
        true
    }

    /// Deferred arguments are never resolved, so they contribute no
    /// dependencies.
    fn dependencies(&self, _ctx: &OpContext<'_>, _args: &[Expr], _auto: &[Cursor]) -> Vec<Cursor> {
        Vec::new()
    }

    fn run(&self, _ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        let body = args
            .iter()
            .map(|arg| arg.to_source())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Response::Replace(Value::String(format!("(( {} ))", body))))
    }
}
