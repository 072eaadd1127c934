//! `param` - a required value the caller must supply.
//!
//! A `(( param "…" ))` that survives all merges means the document set
//! never provided the value, which is a validation failure that names
//! the destination and carries the author's message.

use weft_par::Expr;
use weft_tree::Cursor;
use weft_util::{Error, Result};

use crate::{OpContext, Operator, Phase, Response};

pub struct Param;

impl Operator for Param {
    fn name(&self) -> &str {
        "param"
    }

    fn phase(&self) -> Phase {
        Phase::Param
    }

    fn dependencies(&self, _ctx: &OpContext<'_>, _args: &[Expr], _auto: &[Cursor]) -> Vec<Cursor> {
        Vec::new()
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        let message = match args.first() {
            Some(arg) => ctx
                .resolve_text(arg)
                .unwrap_or_else(|_| "this value must be provided".to_string()),
            None => "this value must be provided".to_string(),
        };

        Err(Error::Validation {
            path: ctx.here.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpContext, Registry};
    use weft_tree::Value;

    #[test]
    fn test_param_always_fails_with_message() {
        let registry = Registry::with_defaults();
        let tree: Value = serde_yaml::from_str("{}").unwrap();
        let mut ctx = OpContext::for_tests(&tree, &registry);
        ctx.here = Cursor::parse("meta.env").unwrap();

        let expr =
            weft_par::parse_expression(r#"param "please name the environment""#, &registry)
                .unwrap();
        let Expr::Call { name, args, .. } = &expr else {
            panic!("expected call");
        };

        let err = registry.get(name).run(&ctx, args).unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::Validation { path, message } => {
                assert_eq!(path, "meta.env");
                assert_eq!(message, "please name the environment");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
