//! `inject` - fold referenced mappings into the enclosing mapping.
//!
//! Runs during document assembly. The destination key disappears and
//! the referenced mapping's entries merge into the destination's parent
//! mapping, with keys already present in the parent winning.

use indexmap::IndexMap;

use weft_par::Expr;
use weft_tree::{Cursor, DeepMerger, Merger, Step, Value};
use weft_util::{Error, Result};

use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Phase, Response};

pub struct Inject;

impl Operator for Inject {
    fn name(&self) -> &str {
        "inject"
    }

    fn phase(&self) -> Phase {
        Phase::Merge
    }

    /// Depends on every location under each referenced mapping, so all
    /// expressions inside the injected subtree settle first.
    fn dependencies(&self, ctx: &OpContext<'_>, args: &[Expr], auto: &[Cursor]) -> Vec<Cursor> {
        let mut deps: Vec<Cursor> = auto.to_vec();
        for arg in args {
            if let Expr::Reference { cursor, .. } = arg {
                let canonical = cursor.canonicalize(ctx.tree).unwrap_or_else(|_| cursor.clone());
                if let Ok(subtree) = canonical.resolve(ctx.tree) {
                    collect_subtree(&canonical, subtree, &mut deps);
                } else {
                    deps.push(canonical);
                }
            }
        }
        deps
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("inject", args, 1)?;

        let mut merged: IndexMap<String, Value> = IndexMap::new();
        for arg in args {
            match ctx.resolve(arg)? {
                Value::Map(map) => {
                    DeepMerger.merge_map(&mut merged, map)?;
                }
                other => {
                    return Err(Error::type_error(
                        arg.pos(),
                        format!("`inject` needs a map, got {}", other.type_name()),
                    ))
                }
            }
        }
        Ok(Response::Inject(merged))
    }
}

/// Record `at` and every cursor underneath it.
fn collect_subtree(at: &Cursor, value: &Value, out: &mut Vec<Cursor>) {
    out.push(at.clone());
    match value {
        Value::Map(map) => {
            for (key, child) in map {
                collect_subtree(&at.child_key(key), child, out);
            }
        }
        Value::List(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_subtree(&at.child_index(index), child, out);
            }
        }
        _ => {}
    }
}

/// True when the last step of `cursor` names a map key (the only
/// position an injection can occupy).
pub fn injectable_destination(cursor: &Cursor) -> bool {
    matches!(cursor.steps().last(), Some(Step::Key(_)))
}
