//! Arithmetic operators `+ - * / %`.
//!
//! Integers widen to floats when mixed. Integer division with an exact
//! result stays an integer and promotes to float otherwise. `*` also
//! repeats a string by a non-negative integer, bounded to keep a typo
//! from allocating without limit. Division (and remainder) by zero is an
//! error. A single-argument `-` negates.

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Pos, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

/// Ceiling on string-repetition counts.
const MAX_REPEAT: i64 = 10_000;

pub struct Arith {
    symbol: &'static str,
}

impl Arith {
    pub fn new(symbol: &'static str) -> Self {
        Self { symbol }
    }
}

impl Operator for Arith {
    fn name(&self) -> &str {
        self.symbol
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        if self.symbol == "-" && args.len() == 1 {
            let value = match ctx.resolve(&args[0])? {
                Value::Int(i) => Value::Int(-i),
                Value::Float(f) => Value::Float(-f),
                other => {
                    return Err(Error::type_error(
                        args[0].pos(),
                        format!("cannot negate {}", other.type_name()),
                    ))
                }
            };
            return Ok(Response::Replace(value));
        }

        expect_args(self.symbol, args, 2)?;
        let lhs = ctx.resolve(&args[0])?;
        let rhs = ctx.resolve(&args[1])?;

        if self.symbol == "*" {
            if let Some(result) = string_repetition(&lhs, &rhs, args[0].pos())? {
                return Ok(Response::Replace(result));
            }
        }

        Ok(Response::Replace(numeric_binary(
            self.symbol,
            &lhs,
            &rhs,
            args[0].pos(),
        )?))
    }
}

/// `"ab" * 3` and `3 * "ab"`. Returns `None` when neither operand is a
/// string, letting the numeric path take over.
fn string_repetition(lhs: &Value, rhs: &Value, pos: Pos) -> Result<Option<Value>> {
    let (text, count) = match (lhs, rhs) {
        (Value::String(s), Value::Int(n)) => (s, *n),
        (Value::Int(n), Value::String(s)) => (s, *n),
        (Value::String(_), other) | (other, Value::String(_)) => {
            return Err(Error::type_error(
                pos,
                format!(
                    "string repetition needs an integer count, got {}",
                    other.type_name()
                ),
            ))
        }
        _ => return Ok(None),
    };

    if count < 0 {
        return Err(Error::evaluation(
            pos,
            format!("repetition count must not be negative, got {}", count),
        ));
    }
    if count > MAX_REPEAT {
        return Err(Error::evaluation(
            pos,
            format!("repetition count {} exceeds the limit of {}", count, MAX_REPEAT),
        ));
    }

    Ok(Some(Value::String(text.repeat(count as usize))))
}

/// Apply a numeric operator with int→float widening.
///
/// Shared with `calc`, which reuses the same arithmetic over its
/// restricted sub-expressions.
pub(crate) fn numeric_binary(symbol: &str, lhs: &Value, rhs: &Value, pos: Pos) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_binary(symbol, *a, *b, pos),
        (Value::Int(a), Value::Float(b)) => float_binary(symbol, *a as f64, *b, pos),
        (Value::Float(a), Value::Int(b)) => float_binary(symbol, *a, *b as f64, pos),
        (Value::Float(a), Value::Float(b)) => float_binary(symbol, *a, *b, pos),
        (a, b) => Err(Error::type_error(
            pos,
            format!(
                "cannot apply `{}` to {} and {}",
                symbol,
                a.type_name(),
                b.type_name()
            ),
        )),
    }
}

fn int_binary(symbol: &str, a: i64, b: i64, pos: Pos) -> Result<Value> {
    let value = match symbol {
        "+" => a.checked_add(b).map(Value::Int),
        "-" => a.checked_sub(b).map(Value::Int),
        "*" => a.checked_mul(b).map(Value::Int),
        "/" => {
            if b == 0 {
                return Err(Error::evaluation(pos, "division by zero"));
            }
            if a % b == 0 {
                Some(Value::Int(a / b))
            } else {
                Some(Value::Float(a as f64 / b as f64))
            }
        }
        "%" => {
            if b == 0 {
                return Err(Error::evaluation(pos, "division by zero"));
            }
            Some(Value::Int(a % b))
        }
        other => {
            return Err(Error::evaluation(
                pos,
                format!("`{}` is not an arithmetic operator", other),
            ))
        }
    };

    // Overflowing integer arithmetic widens rather than wrapping.
    Ok(value.unwrap_or_else(|| {
        let a = a as f64;
        let b = b as f64;
        Value::Float(match symbol {
            "+" => a + b,
            "-" => a - b,
            _ => a * b,
        })
    }))
}

fn float_binary(symbol: &str, a: f64, b: f64, pos: Pos) -> Result<Value> {
    let value = match symbol {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(Error::evaluation(pos, "division by zero"));
            }
            a / b
        }
        "%" => {
            if b == 0.0 {
                return Err(Error::evaluation(pos, "division by zero"));
            }
            a % b
        }
        other => {
            return Err(Error::evaluation(
                pos,
                format!("`{}` is not an arithmetic operator", other),
            ))
        }
    };
    Ok(Value::Float(value))
}
