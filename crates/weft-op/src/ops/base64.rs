//! `base64` / `base64-decode` - standard-alphabet transcoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Base64Encode;

impl Operator for Base64Encode {
    fn name(&self) -> &str {
        "base64"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("base64", args, 1)?;
        let text = ctx.resolve_text(&args[0])?;
        Ok(Response::Replace(Value::String(STANDARD.encode(text))))
    }
}

pub struct Base64Decode;

impl Operator for Base64Decode {
    fn name(&self) -> &str {
        "base64-decode"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("base64-decode", args, 1)?;

        let encoded = match ctx.resolve(&args[0])? {
            Value::String(s) => s,
            other => {
                return Err(Error::type_error(
                    args[0].pos(),
                    format!("`base64-decode` needs a string, got {}", other.type_name()),
                ))
            }
        };

        let bytes = STANDARD.decode(encoded.trim()).map_err(|err| {
            Error::evaluation(args[0].pos(), format!("invalid base64 input: {}", err))
        })?;
        let decoded = String::from_utf8(bytes).map_err(|_| {
            Error::evaluation(args[0].pos(), "decoded data is not valid UTF-8")
        })?;

        Ok(Response::Replace(Value::String(decoded)))
    }
}
