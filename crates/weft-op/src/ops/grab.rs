//! `grab` - pull values from elsewhere in the tree.
//!
//! `(( grab a.b ))` replaces the destination with the resolved value.
//! A computed argument (a nested call or a string) names a path to
//! follow, so `(( grab (concat "config." meta.env) ))` first builds the
//! path and then resolves it. With several arguments the results are
//! gathered into one list, and arguments that are themselves lists
//! contribute their elements rather than nesting.

use weft_par::Expr;
use weft_tree::{Cursor, Value};
use weft_util::{Error, Result};

use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Response};

pub struct Grab;

impl Grab {
    /// Resolve one argument. Reference arguments yield their value
    /// as-is; computed string results are followed as paths.
    fn grab_one(ctx: &OpContext<'_>, arg: &Expr) -> Result<Value> {
        if matches!(arg, Expr::Reference { .. }) {
            return ctx.resolve(arg);
        }

        match ctx.resolve(arg)? {
            Value::String(path) => {
                let cursor = Cursor::parse(&path).map_err(|_| {
                    Error::reference(arg.pos(), path.clone(), "is not a valid path")
                })?;
                cursor.resolve(ctx.tree).cloned().map_err(|_| {
                    Error::reference(arg.pos(), path, "could not be found in the tree")
                })
            }
            value => Ok(value),
        }
    }
}

impl Operator for Grab {
    fn name(&self) -> &str {
        "grab"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("grab", args, 1)?;

        if args.len() == 1 {
            return Ok(Response::Replace(Self::grab_one(ctx, &args[0])?));
        }

        let mut gathered = Vec::new();
        for arg in args {
            match Self::grab_one(ctx, arg)? {
                Value::List(items) => gathered.extend(items),
                value => gathered.push(value),
            }
        }
        Ok(Response::Replace(Value::List(gathered)))
    }
}
