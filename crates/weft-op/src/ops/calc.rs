//! `calc` - restricted arithmetic over a quoted sub-expression.
//!
//! `(( calc "disk.size_gb * 1024" ))` parses its argument with the
//! expression grammar and evaluates only the arithmetic subset: number
//! literals, references to numeric values, `+ - * / %`, unary minus, and
//! parentheses. Anything else in the sub-expression is a type error.

use weft_par::Expr;
use weft_tree::{Cursor, Value};
use weft_util::{Error, Result};

use crate::ops::arith::numeric_binary;
use crate::ops::expect_args;
use crate::{default_dependencies, OpContext, Operator, Response};

pub struct Calc;

impl Calc {
    fn parse_formula(ctx: &OpContext<'_>, arg: &Expr) -> Result<Expr> {
        let formula = ctx.resolve_text(arg)?;
        weft_par::parse_expression(&formula, ctx.registry())
            .map_err(|err| err.chained(arg.pos(), format!("in calc formula `{}`", formula)))
    }

    fn eval_restricted(ctx: &OpContext<'_>, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal {
                value: value @ (Value::Int(_) | Value::Float(_)),
                ..
            } => Ok(value.clone()),

            Expr::Reference { .. } => match ctx.resolve(expr)? {
                value @ (Value::Int(_) | Value::Float(_)) => Ok(value),
                other => Err(Error::type_error(
                    expr.pos(),
                    format!("calc references must be numeric, got {}", other.type_name()),
                )),
            },

            Expr::Call { name, args, pos } if name == "-" && args.len() == 1 => {
                match Self::eval_restricted(ctx, &args[0])? {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    _ => Err(Error::type_error(*pos, "cannot negate a non-number")),
                }
            }

            Expr::Call { name, args, pos }
                if matches!(name.as_str(), "+" | "-" | "*" | "/" | "%") && args.len() == 2 =>
            {
                let lhs = Self::eval_restricted(ctx, &args[0])?;
                let rhs = Self::eval_restricted(ctx, &args[1])?;
                numeric_binary(name, &lhs, &rhs, *pos)
            }

            other => Err(Error::type_error(
                other.pos(),
                "calc supports numbers, references and arithmetic only",
            )),
        }
    }
}

impl Operator for Calc {
    fn name(&self) -> &str {
        "calc"
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn dependencies(&self, ctx: &OpContext<'_>, args: &[Expr], auto: &[Cursor]) -> Vec<Cursor> {
        let mut deps = default_dependencies(ctx, args, auto);
        // References inside the formula string are dependencies too.
        if let Some(arg) = args.first() {
            if let Ok(parsed) = Self::parse_formula(ctx, arg) {
                deps.extend(default_dependencies(ctx, &[parsed], &[]));
            }
        }
        deps
    }

    fn run(&self, ctx: &OpContext<'_>, args: &[Expr]) -> Result<Response> {
        expect_args("calc", args, 1)?;
        let formula = Self::parse_formula(ctx, &args[0])?;
        Ok(Response::Replace(Self::eval_restricted(ctx, &formula)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::{eval, eval_ok};

    #[test]
    fn test_plain_arithmetic() {
        assert_eq!(eval_ok("{}", r#"calc "2 + 3 * 4""#), Value::Int(14));
    }

    #[test]
    fn test_references_in_formula() {
        assert_eq!(
            eval_ok("disk:\n  size_gb: 4\n", r#"calc "disk.size_gb * 1024""#),
            Value::Int(4096)
        );
    }

    #[test]
    fn test_parenthesized_formula() {
        assert_eq!(eval_ok("{}", r#"calc "(2 + 3) * 4""#), Value::Int(20));
    }

    #[test]
    fn test_division_by_zero_in_formula() {
        assert!(eval("{}", r#"calc "1 / 0""#).is_err());
    }

    #[test]
    fn test_string_reference_rejected() {
        assert!(eval("s: text\n", r#"calc "s * 2""#).is_err());
    }

    #[test]
    fn test_string_literal_in_formula_rejected() {
        assert!(eval("{}", r#"calc "1 + \"two\"""#).is_err());
    }

    #[test]
    fn test_dependencies_include_formula_references() {
        let registry = crate::Registry::with_defaults();
        let tree: Value = serde_yaml::from_str("disk:\n  size_gb: 4\n").unwrap();
        let ctx = crate::OpContext::for_tests(&tree, &registry);

        let expr = weft_par::parse_expression(r#"calc "disk.size_gb * 1024""#, &registry).unwrap();
        let Expr::Call { name, args, .. } = &expr else {
            panic!("expected call");
        };
        let deps = registry.get(name).dependencies(&ctx, args, &[]);
        assert!(deps
            .iter()
            .any(|cursor| cursor.to_string() == "disk.size_gb"));
    }
}
