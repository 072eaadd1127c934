//! Minimal fallback parser.
//!
//! Handles the original flat call form only: a head operator followed by
//! simple arguments (literals, references, environment variables), or a
//! single bare value. No infix operators, no nesting, no alternation.
//! Selected with the `LEGACY_PARSER` environment toggle; the full parser
//! is the default.

use weft_lex::{tokenize, Token, TokenKind};
use weft_tree::{Cursor, Value};
use weft_util::{Error, Result};

use crate::ast::Expr;
use crate::OperatorNames;

/// Parse a payload with the minimal grammar.
pub fn parse_legacy(source: &str, names: &dyn OperatorNames) -> Result<Expr> {
    let tokens = tokenize(source)?;

    let head = &tokens[0];
    if let TokenKind::Ident(name) = &head.kind {
        if names.contains_operator(name) {
            let mut args = Vec::new();
            for token in &tokens[1..] {
                if token.kind == TokenKind::Eof {
                    break;
                }
                if token.kind == TokenKind::Comma {
                    continue;
                }
                args.push(simple_argument(token)?);
            }
            return Ok(Expr::Call {
                name: name.clone(),
                args,
                pos: head.pos,
            });
        }
    }

    // A single bare value.
    if tokens.len() == 2 && tokens[1].kind == TokenKind::Eof {
        return simple_argument(&tokens[0]);
    }

    Err(Error::syntax(
        head.pos,
        "expression requires the full parser (unset LEGACY_PARSER)",
    ))
}

fn simple_argument(token: &Token) -> Result<Expr> {
    let expr = match &token.kind {
        TokenKind::Int(i) => Expr::Literal {
            value: Value::Int(*i),
            pos: token.pos,
        },
        TokenKind::Float(f) => Expr::Literal {
            value: Value::Float(*f),
            pos: token.pos,
        },
        TokenKind::Str(s) => Expr::Literal {
            value: Value::String(s.clone()),
            pos: token.pos,
        },
        TokenKind::True => Expr::Literal {
            value: Value::Bool(true),
            pos: token.pos,
        },
        TokenKind::False => Expr::Literal {
            value: Value::Bool(false),
            pos: token.pos,
        },
        TokenKind::Null => Expr::Literal {
            value: Value::Null,
            pos: token.pos,
        },
        TokenKind::Reference(path) => Expr::Reference {
            cursor: Cursor::parse(path)?,
            pos: token.pos,
        },
        TokenKind::Ident(name) => Expr::Reference {
            cursor: Cursor::parse(name)?,
            pos: token.pos,
        },
        TokenKind::EnvVar(name) => Expr::EnvVar {
            name: name.clone(),
            pos: token.pos,
        },
        other => {
            return Err(Error::syntax(
                token.pos,
                format!(
                    "{} requires the full parser (unset LEGACY_PARSER)",
                    other.describe()
                ),
            ))
        }
    };
    Ok(expr)
}
