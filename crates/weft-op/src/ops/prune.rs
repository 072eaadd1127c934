//! `prune` - remove the destination from the output.
//!
//! Runs during document assembly. The call itself leaves the value in
//! place (`Keep`); the evaluator deletes every prune destination once
//! the merge phase completes, so the key can still participate in
//! merging until then.

use weft_par::Expr;
use weft_tree::Cursor;
use weft_util::Result;

use crate::{OpContext, Operator, Phase, Response};

pub struct Prune;

impl Operator for Prune {
    fn name(&self) -> &str {
        "prune"
    }

    fn phase(&self) -> Phase {
        Phase::Merge
    }

    fn dependencies(&self, _ctx: &OpContext<'_>, _args: &[Expr], _auto: &[Cursor]) -> Vec<Cursor> {
        Vec::new()
    }

    fn run(&self, _ctx: &OpContext<'_>, _args: &[Expr]) -> Result<Response> {
        Ok(Response::Keep)
    }
}
