//! Comparison operators `== != < <= > >=`.
//!
//! Equality compares values structurally, with numeric cross-type
//! comparison (an integer equals the float of the same magnitude).
//! Ordering is defined for numbers and for strings (lexicographic);
//! everything else is a type error.

use std::cmp::Ordering;

use weft_par::Expr;
use weft_tree::Value;
use weft_util::{Error, Pos, Result};

use crate::ops::expect_args;
use crate::{OpContext, Operator, Response};

pub struct Cmp {
    symbol: &'static str,
}

impl Cmp {
    pub fn new(symbol: &'static str) -> Self {
        Self { symbol }
    }
}

impl Operator for Cmp {
    fn name(&self) -> &str {
        self.symbol
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args(self.symbol, args, 2)?;
        let lhs = ctx.resolve(&args[0])?;
        let rhs = ctx.resolve(&args[1])?;

        let result = match self.symbol {
            "==" => values_equal(&lhs, &rhs),
            "!=" => !values_equal(&lhs, &rhs),
            symbol => {
                let ordering = order(&lhs, &rhs, args[0].pos())?;
                match symbol {
                    "<" => ordering == Ordering::Less,
                    "<=" => ordering != Ordering::Greater,
                    ">" => ordering == Ordering::Greater,
                    ">=" => ordering != Ordering::Less,
                    other => {
                        return Err(Error::evaluation(
                            args[0].pos(),
                            format!("`{}` is not a comparison operator", other),
                        ))
                    }
                }
            }
        };

        Ok(Response::Replace(Value::Bool(result)))
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (numeric(lhs), numeric(rhs)) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn order(lhs: &Value, rhs: &Value, pos: Pos) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (numeric(lhs), numeric(rhs)) {
        return a.partial_cmp(&b).ok_or_else(|| {
            Error::evaluation(pos, "cannot order a not-a-number value")
        });
    }
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    Err(Error::type_error(
        pos,
        format!(
            "cannot order {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ),
    ))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};

    #[test]
    fn test_equality() {
        assert_eq!(eval_ok("{}", "1 == 1"), Value::Bool(true));
        assert_eq!(eval_ok("{}", "1 == 2"), Value::Bool(false));
        assert_eq!(eval_ok("{}", "1 != 2"), Value::Bool(true));
    }

    #[test]
    fn test_numeric_cross_type_equality() {
        assert_eq!(eval_ok("{}", "1 == 1.0"), Value::Bool(true));
    }

    #[test]
    fn test_string_equality() {
        assert_eq!(eval_ok("a: x\nb: x\n", "a == b"), Value::Bool(true));
    }

    #[test]
    fn test_relational_numbers() {
        assert_eq!(eval_ok("{}", "2 < 3"), Value::Bool(true));
        assert_eq!(eval_ok("{}", "3 <= 3"), Value::Bool(true));
        assert_eq!(eval_ok("{}", "2 > 3"), Value::Bool(false));
        assert_eq!(eval_ok("{}", "3 >= 4"), Value::Bool(false));
    }

    #[test]
    fn test_relational_strings() {
        assert_eq!(eval_ok(r#"a: apple"#, r#"a < "banana""#), Value::Bool(true));
    }

    #[test]
    fn test_relational_mixed_types_error() {
        assert!(eval("a: x\n", "a < 3").is_err());
    }

    #[test]
    fn test_nil_equality() {
        assert_eq!(eval_ok("n: ~\n", "n == nil"), Value::Bool(true));
    }
}
