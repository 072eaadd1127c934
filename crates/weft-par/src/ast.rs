//! Expression tree definitions.
//!
//! An expression is a tagged variant: literal, reference, environment
//! variable, operator call, or alternation chain. Operator calls hold
//! their arguments as an ordered sequence of child expressions, so calls
//! nest arbitrarily. Infix operators (`+`, `==`, `&&`, `!`, `?:`) are
//! represented as calls whose name is the operator lexeme; `||` is the
//! grammar-level [`Expr::Or`] chain.
//!
//! Every node carries the position of its first token. Equality ignores
//! positions, so structurally identical parses compare equal regardless
//! of surrounding whitespace.

use weft_tree::{Cursor, Value};
use weft_util::Pos;

/// An expression tree node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal scalar value.
    Literal { value: Value, pos: Pos },

    /// A reference into the document tree.
    Reference { cursor: Cursor, pos: Pos },

    /// An environment-variable lookup.
    EnvVar { name: String, pos: Pos },

    /// An operator call with ordered arguments.
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Pos,
    },

    /// A `||` alternation chain; alternatives try left to right.
    Or { alternatives: Vec<Expr>, pos: Pos },
}

impl Expr {
    /// The position of this node's first token.
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal { pos, .. }
            | Expr::Reference { pos, .. }
            | Expr::EnvVar { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Or { pos, .. } => *pos,
        }
    }

    /// Build a literal with a dummy position.
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal {
            value: value.into(),
            pos: Pos::DUMMY,
        }
    }

    /// True when this node is an operator call with the given name.
    pub fn is_call_to(&self, operator: &str) -> bool {
        matches!(self, Expr::Call { name, .. } if name == operator)
    }

    /// Render the canonical source form of this expression.
    ///
    /// The canonical form reparses to an equal tree: compound arguments
    /// are parenthesized, strings are re-escaped, and alternation chains
    /// print flat.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_par::Expr;
    /// use weft_tree::Value;
    ///
    /// let expr = Expr::Call {
    ///     name: "grab".into(),
    ///     args: vec![Expr::literal(Value::from("x"))],
    ///     pos: Default::default(),
    /// };
    /// assert_eq!(expr.to_source(), "grab \"x\"");
    /// ```
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out, false);
        out
    }

    fn write_source(&self, out: &mut String, as_argument: bool) {
        match self {
            Expr::Literal { value, .. } => write_literal(out, value),
            Expr::Reference { cursor, .. } => out.push_str(&cursor.to_string()),
            Expr::EnvVar { name, .. } => {
                out.push('$');
                out.push_str(name);
            }
            Expr::Call { name, args, .. } => {
                let parenthesize = as_argument;
                if parenthesize {
                    out.push('(');
                }
                write_call(out, name, args);
                if parenthesize {
                    out.push(')');
                }
            }
            Expr::Or { alternatives, .. } => {
                if as_argument {
                    out.push('(');
                }
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" || ");
                    }
                    alt.write_source(out, true);
                }
                if as_argument {
                    out.push(')');
                }
            }
        }
    }
}

fn write_call(out: &mut String, name: &str, args: &[Expr]) {
    match (name, args.len()) {
        ("!", 1) => {
            out.push('!');
            args[0].write_source(out, true);
        }
        ("-", 1) => {
            out.push('-');
            args[0].write_source(out, true);
        }
        ("?:", 3) => {
            args[0].write_source(out, true);
            out.push_str(" ? ");
            args[1].write_source(out, true);
            out.push_str(" : ");
            args[2].write_source(out, true);
        }
        (op, 2) if is_infix(op) => {
            args[0].write_source(out, true);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            args[1].write_source(out, true);
        }
        _ => {
            out.push_str(name);
            for arg in args {
                out.push(' ');
                arg.write_source(out, true);
            }
        }
    }
}

fn is_infix(name: &str) -> bool {
    matches!(
        name,
        "+" | "-" | "*" | "/" | "%" | "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&"
    )
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&weft_tree::format_float(*f)),
        Value::String(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
        // Compound literals never come out of the parser; print a
        // placeholder so debugging output stays readable.
        other => out.push_str(other.type_name()),
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Literal { value: a, .. }, Expr::Literal { value: b, .. }) => a == b,
            (Expr::Reference { cursor: a, .. }, Expr::Reference { cursor: b, .. }) => a == b,
            (Expr::EnvVar { name: a, .. }, Expr::EnvVar { name: b, .. }) => a == b,
            (
                Expr::Call {
                    name: a, args: x, ..
                },
                Expr::Call {
                    name: b, args: y, ..
                },
            ) => a == b && x == y,
            (Expr::Or { alternatives: a, .. }, Expr::Or { alternatives: b, .. }) => a == b,
            _ => false,
        }
    }
}
