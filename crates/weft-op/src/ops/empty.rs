//! `empty` - a fresh empty value of a named kind.
//!
//! `(( empty map ))`, `(( empty list ))`, `(( empty string ))`. The kind
//! is written bare (it parses as a one-segment reference and is read as
//! a name, not resolved) or as a quoted string.

use indexmap::IndexMap;

use weft_par::Expr;
use weft_tree::{Cursor, Step, Value};
use weft_util::{Error, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Empty;

impl Operator for Empty {
    fn name(&self) -> &str {
        "empty"
    }

    fn is_safe(&self) -> bool {
        true
    }

    /// The argument is a kind name, not a tree location.
    fn dependencies(&self, _ctx: &OpContext<'_>, _args: &[Expr], _auto: &[Cursor]) -> Vec<Cursor> {
        Vec::new()
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("empty", args, 1)?;

        let kind = match &args[0] {
            Expr::Reference { cursor, .. } if cursor.len() == 1 => match &cursor.steps()[0] {
                Step::Key(name) => name.clone(),
                Step::Index(_) => {
                    return Err(Error::type_error(args[0].pos(), "expected a kind name"))
                }
            },
            other => ctx.resolve_text(other)?,
        };

        let value = match kind.as_str() {
            "map" | "hash" => Value::Map(IndexMap::new()),
            "list" | "array" => Value::List(Vec::new()),
            "string" | "str" => Value::String(String::new()),
            other => {
                return Err(Error::type_error(
                    args[0].pos(),
                    format!(
                        "`empty` knows map, list and string, not `{}`",
                        other
                    ),
                ))
            }
        };
        Ok(Response::Replace(value))
    }
}
