//! weft-par - Expression parser.
//!
//! Parses tokenized `(( … ))` payloads into expression trees using
//! precedence climbing (Pratt parsing) for the infix operators, plus
//! grammar rules for the two constructs that do not fit the binary mold:
//! `||` alternation chains and the `?:` ternary.
//!
//! # Operator Precedence (lowest to highest)
//!
//! | Level | Operators | Associativity |
//! |-------|-----------|---------------|
//! | 1 | `\|\|` | Right (chain) |
//! | 2 | `?:` | Right |
//! | 3 | `&&` | Left |
//! | 4 | `==`, `!=` | Left |
//! | 5 | `<`, `<=`, `>`, `>=` | Left |
//! | 6 | `+`, `-` | Left |
//! | 7 | `*`, `/`, `%` | Left |
//! | 8 | `!`, unary `-` | Prefix |
//! | 9 | call / primary | |
//!
//! # Operator calls
//!
//! A bare identifier heads an operator call when it names a registered
//! operator: `grab a.b` or `join "," list`. Juxtaposed arguments are
//! primaries; a nested call must be parenthesized, as in
//! `grab (concat "config." meta.env)`. Commas between arguments are
//! accepted. An identifier that names no registered operator parses as a
//! reference.

pub mod ast;
pub mod legacy;

pub use ast::Expr;
pub use legacy::parse_legacy;

use tracing::trace;

use weft_lex::{tokenize, Token, TokenKind};
use weft_tree::{Cursor, Value};
use weft_util::{Error, ParserKind, Result};

/// Binding power levels for precedence climbing.
/// Higher numbers bind tighter.
#[doc(hidden)]
pub mod bp {
    /// Minimum binding power (start of a binary expression).
    pub const MIN: u8 = 0;

    /// Logical AND: `&&`
    pub const LOGICAL_AND: u8 = 2;

    /// Equality: `==`, `!=`
    pub const EQUALITY: u8 = 4;

    /// Relational: `<`, `<=`, `>`, `>=`
    pub const RELATIONAL: u8 = 6;

    /// Additive: `+`, `-`
    pub const ADDITIVE: u8 = 8;

    /// Multiplicative: `*`, `/`, `%`
    pub const MULTIPLICATIVE: u8 = 10;
}

/// Answers "does this name belong to a registered operator?".
///
/// The operator registry implements this; tests use a plain set.
pub trait OperatorNames {
    /// True when `name` is a registered operator.
    fn contains_operator(&self, name: &str) -> bool;
}

impl OperatorNames for std::collections::HashSet<String> {
    fn contains_operator(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl OperatorNames for [&str] {
    fn contains_operator(&self, name: &str) -> bool {
        self.contains(&name)
    }
}

impl<const N: usize> OperatorNames for [&str; N] {
    fn contains_operator(&self, name: &str) -> bool {
        self.as_slice().contains(&name)
    }
}

/// Error recovery policy for a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    /// Stop at the first error.
    #[default]
    FailFast,
    /// Collect up to this many errors, resynchronizing on `,` or `)`.
    Collect(usize),
}

/// Extract the payload of an expression string.
///
/// A string scalar holds an expression when, ignoring surrounding
/// whitespace, it is exactly one `(( … ))` fragment. Returns the trimmed
/// payload, or `None` for plain strings. Inline mixing inside a larger
/// string is not an expression; `concat` is the composition tool.
///
/// # Examples
///
/// ```
/// use weft_par::extract_payload;
///
/// assert_eq!(extract_payload("  (( grab a.b ))"), Some("grab a.b"));
/// assert_eq!(extract_payload("plain text"), None);
/// assert_eq!(extract_payload("x: (( grab a ))"), None);
/// ```
pub fn extract_payload(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("((")?.strip_suffix("))")?;
    Some(inner.trim())
}

/// Parse an expression payload with the full parser.
pub fn parse_expression(source: &str, names: &dyn OperatorNames) -> Result<Expr> {
    Parser::new(source, names)?.parse()
}

/// Parse an expression payload with the selected parser.
pub fn parse_with(source: &str, names: &dyn OperatorNames, kind: ParserKind) -> Result<Expr> {
    match kind {
        ParserKind::Enhanced => parse_expression(source, names),
        ParserKind::Legacy => parse_legacy(source, names),
    }
}

/// Recursive-descent parser over a token buffer.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    index: usize,
    names: &'a dyn OperatorNames,
    recovery: Recovery,
    errors: Vec<Error>,
}

impl<'a> Parser<'a> {
    /// Tokenize a payload and set up a fail-fast parser.
    pub fn new(source: &str, names: &'a dyn OperatorNames) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            index: 0,
            names,
            recovery: Recovery::FailFast,
            errors: Vec::new(),
        })
    }

    /// Select an error recovery policy.
    pub fn with_recovery(mut self, recovery: Recovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// Parse the payload as a single expression.
    pub fn parse(mut self) -> Result<Expr> {
        let expr = self.parse_or()?;

        if self.current().kind != TokenKind::Eof {
            let token = self.current().clone();
            return Err(Error::syntax(
                token.pos,
                format!("unexpected {} after expression", token.kind.describe()),
            ));
        }

        match self.errors.len() {
            0 => Ok(expr),
            1 => Err(self.errors.pop().unwrap()),
            _ => Err(Error::Multi {
                errors: std::mem::take(&mut self.errors),
            }),
        }
    }

    // =========================================================================
    // GRAMMAR LEVELS
    // =========================================================================

    /// Alternation chains: `a || b || c`. Lowest precedence; a chain is
    /// one `Or` node whose alternatives try left to right.
    fn parse_or(&mut self) -> Result<Expr> {
        let first = self.parse_ternary()?;
        if self.current().kind != TokenKind::OrOr {
            return Ok(first);
        }

        let pos = first.pos();
        let mut alternatives = vec![first];
        while self.eat(&TokenKind::OrOr) {
            alternatives.push(self.parse_ternary()?);
        }
        Ok(Expr::Or { alternatives, pos })
    }

    /// Ternary `cond ? then : else`, right-associative. The then branch
    /// is a full expression (the `?`/`:` pair delimits it); the else
    /// branch is another ternary, so chains nest on the right.
    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_binary(bp::MIN)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }

        let pos = cond.pos();
        let then = self.parse_or()?;

        if !self.eat(&TokenKind::Colon) {
            let token = self.current().clone();
            return Err(Error::syntax(
                token.pos,
                format!(
                    "missing `:` in ternary expression; found {}",
                    token.kind.describe()
                ),
            ));
        }

        let otherwise = self.parse_ternary()?;
        Ok(Expr::Call {
            name: "?:".to_string(),
            args: vec![cond, then, otherwise],
            pos,
        })
    }

    /// Precedence climbing over the binary operators.
    ///
    /// Left-associative levels use `right_bp = left_bp + 1`, so an equal
    /// operator on the right does not extend the recursion.
    fn parse_binary(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let Some((left_bp, right_bp, name)) = infix_binding_power(&self.current().kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }

            let pos = lhs.pos();
            self.advance();
            let rhs = self.parse_binary(right_bp)?;
            lhs = Expr::Call {
                name: name.to_string(),
                args: vec![lhs, rhs],
                pos,
            };
        }

        Ok(lhs)
    }

    /// Prefix operators `!` and unary `-`.
    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Call {
                    name: "!".to_string(),
                    args: vec![operand],
                    pos: token.pos,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Call {
                    name: "-".to_string(),
                    args: vec![operand],
                    pos: token.pos,
                })
            }
            _ => self.parse_call_or_primary(),
        }
    }

    /// An operator call with juxtaposed arguments, or a primary.
    fn parse_call_or_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        if let TokenKind::Ident(name) = &token.kind {
            if self.names.contains_operator(name) {
                trace!(operator = %name, "parsing operator call");
                self.advance();
                let args = self.parse_arguments()?;
                return Ok(Expr::Call {
                    name: name.clone(),
                    args,
                    pos: token.pos,
                });
            }

            // A bare identifier followed by argument tokens would be a
            // call, but no operator has this name.
            if self.peek_is_argument_start(1) {
                return Err(Error::syntax(
                    token.pos,
                    format!("unknown operator `{}`", name),
                ));
            }
        }

        self.parse_primary()
    }

    /// Juxtaposed call arguments, each a primary, until a token that
    /// cannot start an argument. Commas between arguments are skipped.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        loop {
            if !self.at_argument_start() {
                return Ok(args);
            }
            match self.parse_primary() {
                Ok(arg) => args.push(arg),
                Err(err) => {
                    if !self.record_and_resync(err)? {
                        return Ok(args);
                    }
                }
            }
            self.eat(&TokenKind::Comma);
        }
    }

    /// Literals, references, environment variables, and parenthesized
    /// sub-expressions.
    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match &token.kind {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Int(*i),
                    pos: token.pos,
                })
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Float(*f),
                    pos: token.pos,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::String(s.clone()),
                    pos: token.pos,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Bool(true),
                    pos: token.pos,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Bool(false),
                    pos: token.pos,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal {
                    value: Value::Null,
                    pos: token.pos,
                })
            }
            TokenKind::Reference(path) => {
                self.advance();
                let cursor = Cursor::parse(path)
                    .map_err(|_| Error::syntax(token.pos, format!("malformed reference `{}`", path)))?;
                Ok(Expr::Reference {
                    cursor,
                    pos: token.pos,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Reference {
                    cursor: Cursor::parse(name)
                        .map_err(|_| Error::syntax(token.pos, format!("malformed reference `{}`", name)))?,
                    pos: token.pos,
                })
            }
            TokenKind::EnvVar(name) => {
                self.advance();
                Ok(Expr::EnvVar {
                    name: name.clone(),
                    pos: token.pos,
                })
            }
            TokenKind::LParen => {
                let open = token.pos;
                self.advance();
                let inner = self.parse_or()?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(Error::syntax(
                        open,
                        format!("unclosed parenthesis opened at column {}", open.column),
                    ));
                }
                Ok(inner)
            }
            kind if kind.is_binary_operator() => Err(Error::syntax(
                token.pos,
                "expected operand between operators".to_string(),
            )),
            other => Err(Error::syntax(
                token.pos,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    // =========================================================================
    // TOKEN PLUMBING
    // =========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.current().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_argument_start(&self) -> bool {
        Self::starts_argument(&self.current().kind)
    }

    fn peek_is_argument_start(&self, offset: usize) -> bool {
        self.tokens
            .get(self.index + offset)
            .map(|t| Self::starts_argument(&t.kind))
            .unwrap_or(false)
    }

    fn starts_argument(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Ident(_)
                | TokenKind::Reference(_)
                | TokenKind::EnvVar(_)
                | TokenKind::Str(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::LParen
        )
    }

    /// Handle an error under the recovery policy: record it and skip to
    /// the next `,` or `)`. Returns false when the budget is exhausted
    /// and the caller should stop.
    fn record_and_resync(&mut self, err: Error) -> Result<bool> {
        match self.recovery {
            Recovery::FailFast => Err(err),
            Recovery::Collect(max) => {
                self.errors.push(err);
                if self.errors.len() >= max {
                    return Ok(false);
                }
                while !matches!(
                    self.current().kind,
                    TokenKind::Comma | TokenKind::RParen | TokenKind::Eof
                ) {
                    self.advance();
                }
                // Consume the synchronization token and continue with the
                // next argument.
                if !self.eat(&TokenKind::Comma) {
                    self.eat(&TokenKind::RParen);
                }
                Ok(true)
            }
        }
    }
}

/// Binding powers of the infix operators handled by the climb loop.
/// `||` and `?:` are grammar-level and deliberately absent.
fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8, &'static str)> {
    let entry = match kind {
        TokenKind::AndAnd => (bp::LOGICAL_AND, bp::LOGICAL_AND + 1, "&&"),
        TokenKind::EqEq => (bp::EQUALITY, bp::EQUALITY + 1, "=="),
        TokenKind::NotEq => (bp::EQUALITY, bp::EQUALITY + 1, "!="),
        TokenKind::Lt => (bp::RELATIONAL, bp::RELATIONAL + 1, "<"),
        TokenKind::LtEq => (bp::RELATIONAL, bp::RELATIONAL + 1, "<="),
        TokenKind::Gt => (bp::RELATIONAL, bp::RELATIONAL + 1, ">"),
        TokenKind::GtEq => (bp::RELATIONAL, bp::RELATIONAL + 1, ">="),
        TokenKind::Plus => (bp::ADDITIVE, bp::ADDITIVE + 1, "+"),
        TokenKind::Minus => (bp::ADDITIVE, bp::ADDITIVE + 1, "-"),
        TokenKind::Star => (bp::MULTIPLICATIVE, bp::MULTIPLICATIVE + 1, "*"),
        TokenKind::Slash => (bp::MULTIPLICATIVE, bp::MULTIPLICATIVE + 1, "/"),
        TokenKind::Percent => (bp::MULTIPLICATIVE, bp::MULTIPLICATIVE + 1, "%"),
        _ => return None,
    };
    Some(entry)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use weft_util::Pos;

    const OPERATORS: [&str; 8] = [
        "grab", "concat", "join", "keys", "base64", "base64-decode", "null", "calc",
    ];

    fn parse(source: &str) -> Result<Expr> {
        parse_expression(source, &OPERATORS)
    }

    fn parse_ok(source: &str) -> Expr {
        parse(source).unwrap_or_else(|e| panic!("failed to parse `{}`: {}", source, e))
    }

    fn assert_call(expr: &Expr, operator: &str) -> Vec<Expr> {
        match expr {
            Expr::Call { name, args, .. } => {
                assert_eq!(name, operator, "expected call to {:?}", operator);
                args.clone()
            }
            other => panic!("expected call to {:?}, got {:?}", operator, other),
        }
    }

    // =========================================================================
    // PRIMARIES
    // =========================================================================

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_ok("42"), Expr::literal(42i64));
        assert_eq!(parse_ok("2.5"), Expr::literal(2.5));
        assert_eq!(parse_ok(r#""hi""#), Expr::literal("hi"));
        assert_eq!(parse_ok("true"), Expr::literal(true));
        assert_eq!(parse_ok("nil"), Expr::literal(Value::Null));
    }

    #[test]
    fn test_parse_reference() {
        let expr = parse_ok("meta.env");
        assert_eq!(
            expr,
            Expr::Reference {
                cursor: Cursor::parse("meta.env").unwrap(),
                pos: Pos::DUMMY,
            }
        );
    }

    #[test]
    fn test_parse_env_var() {
        assert_eq!(
            parse_ok("$HOME"),
            Expr::EnvVar {
                name: "HOME".into(),
                pos: Pos::DUMMY,
            }
        );
    }

    #[test]
    fn test_unregistered_ident_is_reference() {
        let expr = parse_ok("meta");
        assert!(matches!(expr, Expr::Reference { .. }));
    }

    // =========================================================================
    // OPERATOR CALLS
    // =========================================================================

    #[test]
    fn test_call_juxtaposed_args() {
        let args = assert_call(&parse_ok("grab a.b c"), "grab");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_call_comma_separated_args() {
        let args = assert_call(&parse_ok(r#"join ",", a, b"#), "join");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_call_nested_parenthesized() {
        let args = assert_call(&parse_ok(r#"grab (concat "config." meta.env)"#), "grab");
        assert_eq!(args.len(), 1);
        let inner = assert_call(&args[0], "concat");
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_call_no_args() {
        // An argument-count complaint is the evaluator's job; the
        // grammar allows a bare operator name.
        let args = assert_call(&parse_ok("calc"), "calc");
        assert!(args.is_empty());
    }

    #[test]
    fn test_bare_null_is_a_literal() {
        assert_eq!(parse_ok("null"), Expr::literal(Value::Null));
    }

    #[test]
    fn test_hyphenated_operator() {
        let args = assert_call(&parse_ok(r#"base64-decode "YQ==""#), "base64-decode");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_operator_name_in_argument_position_is_reference() {
        // Nested calls need parens, so a registered name used as an
        // argument resolves as a reference.
        let args = assert_call(&parse_ok("grab keys"), "grab");
        assert!(matches!(args[0], Expr::Reference { .. }));
    }

    #[test]
    fn test_unknown_operator() {
        let err = parse("grabb a.b").unwrap_err();
        assert!(err.to_string().contains("unknown operator `grabb`"));
    }

    // =========================================================================
    // PRECEDENCE
    // =========================================================================

    #[test]
    fn test_precedence_mul_over_add() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let args = assert_call(&parse_ok("2 + 3 * 4"), "+");
        assert_eq!(args[0], Expr::literal(2i64));
        assert_call(&args[1], "*");
    }

    #[test]
    fn test_parens_override_precedence() {
        let args = assert_call(&parse_ok("(2 + 3) * 4"), "*");
        assert_call(&args[0], "+");
    }

    #[test]
    fn test_precedence_and_over_or() {
        // a || b && c parses as a || (b && c)
        let expr = parse_ok("a || b && c");
        match expr {
            Expr::Or { alternatives, .. } => {
                assert_eq!(alternatives.len(), 2);
                assert_call(&alternatives[1], "&&");
            }
            other => panic!("expected alternation, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_comparison_over_and() {
        // a && b == c parses as a && (b == c)
        let args = assert_call(&parse_ok("a && b == c"), "&&");
        assert_call(&args[1], "==");
    }

    #[test]
    fn test_precedence_additive_over_relational() {
        // a + b < c parses as (a + b) < c
        let args = assert_call(&parse_ok("a + b < c"), "<");
        assert_call(&args[0], "+");
    }

    // =========================================================================
    // ASSOCIATIVITY
    // =========================================================================

    #[test]
    fn test_left_associative_subtraction() {
        // a - b - c parses as (a - b) - c
        let args = assert_call(&parse_ok("a - b - c"), "-");
        assert_call(&args[0], "-");
    }

    #[test]
    fn test_left_associative_and() {
        let args = assert_call(&parse_ok("a && b && c"), "&&");
        assert_call(&args[0], "&&");
    }

    #[test]
    fn test_or_chain_is_flat() {
        let expr = parse_ok("a || b || c");
        match expr {
            Expr::Or { alternatives, .. } => assert_eq!(alternatives.len(), 3),
            other => panic!("expected alternation, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary_right_associative() {
        // a ? b : c ? d : e parses as a ? b : (c ? d : e)
        let args = assert_call(&parse_ok("a ? b : c ? d : e"), "?:");
        assert_eq!(args.len(), 3);
        assert_call(&args[2], "?:");
    }

    #[test]
    fn test_ternary_binds_tighter_than_or() {
        // a ? b : c || d parses as (a ? b : c) || d
        let expr = parse_ok("a ? b : c || d");
        match expr {
            Expr::Or { alternatives, .. } => {
                assert_eq!(alternatives.len(), 2);
                assert_call(&alternatives[0], "?:");
            }
            other => panic!("expected alternation, got {:?}", other),
        }
    }

    // =========================================================================
    // UNARY
    // =========================================================================

    #[test]
    fn test_unary_bang() {
        let args = assert_call(&parse_ok("!flag"), "!");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_unary_minus() {
        let args = assert_call(&parse_ok("-3"), "-");
        assert_eq!(args[0], Expr::literal(3i64));
    }

    #[test]
    fn test_unary_minus_in_arithmetic() {
        // -5 + 3 parses as (-5) + 3
        let args = assert_call(&parse_ok("-5 + 3"), "+");
        assert_call(&args[0], "-");
    }

    #[test]
    fn test_chained_unary() {
        let args = assert_call(&parse_ok("!!flag"), "!");
        assert_call(&args[0], "!");
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[test]
    fn test_error_adjacent_binary_operators() {
        let err = parse("5 + + 3").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected operand between operators"));
    }

    #[test]
    fn test_error_unclosed_paren_reports_opening_column() {
        let err = parse("grab (concat a b").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unclosed parenthesis opened at column 6"));
    }

    #[test]
    fn test_error_missing_ternary_colon() {
        let err = parse("a ? b").unwrap_err();
        assert!(err.to_string().contains("missing `:` in ternary"));
    }

    #[test]
    fn test_error_trailing_tokens() {
        let err = parse("a.b )").unwrap_err();
        assert!(err.to_string().contains("after expression"));
    }

    #[test]
    fn test_recovery_collects_errors() {
        let parser = Parser::new(r#"concat (1 +) (2 *) "tail""#, &OPERATORS)
            .unwrap()
            .with_recovery(Recovery::Collect(4));
        let err = parser.parse().unwrap_err();
        match err {
            Error::Multi { errors } => assert!(errors.len() >= 2),
            other => panic!("expected aggregated errors, got {:?}", other),
        }
    }

    // =========================================================================
    // ROUND-TRIP
    // =========================================================================

    #[test]
    fn test_round_trip_canonical_print() {
        let sources = [
            "grab a.b",
            r#"grab (concat "config." meta.env ".host")"#,
            "2 + 3 * 4",
            "(2 + 3) * 4",
            "a || b && c",
            "a ? b : c ? d : e",
            "!flag",
            r#"join "," list.items"#,
            "jobs.0.port",
            "$HOME",
        ];
        for source in sources {
            let once = parse_ok(source);
            let again = parse_ok(&once.to_source());
            assert_eq!(once, again, "round trip failed for `{}`", source);
        }
    }
}
