//! `vault` - fetch a secret through the secret-backend collaborator.
//!
//! Arguments concatenate into the secret path, so
//! `(( vault "secret/" meta.env ":password" ))` composes the path from
//! the tree before the fetch. Calls go through the retry/backoff budget
//! and report an external error once it is exhausted.

use weft_par::Expr;
use weft_util::Result;

use crate::external::call_with_retries;
use crate::ops::expect_min_args;
use crate::{OpContext, Operator, Response};

pub struct Vault;

impl Operator for Vault {
    fn name(&self) -> &str {
        "vault"
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_min_args("vault", args, 1)?;

        let mut path = String::new();
        for arg in args {
            path.push_str(&ctx.resolve_text(arg)?);
        }

        let secret = call_with_retries(ctx.retry(), "vault", |_| ctx.secrets().resolve(&path))?;
        Ok(Response::Replace(secret))
    }
}
