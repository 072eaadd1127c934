//! Token definitions for expression payloads.

use weft_util::Pos;

/// The kind of a token, with any processed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifier. An operator name when it heads a call, otherwise
    /// a single-segment reference.
    Ident(String),
    /// Dotted or bracketed reference path, e.g. `a.b[0].c`.
    Reference(String),
    /// Environment variable, without the `$` sigil.
    EnvVar(String),
    /// Quoted string literal, escapes processed.
    Str(String),
    /// Integer literal. The unary sign is a separate token.
    Int(i64),
    /// Decimal literal.
    Float(f64),
    /// `true`
    True,
    /// `false`
    False,
    /// `nil` or `null`
    Null,

    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,

    /// `||`
    OrOr,
    /// `&&`
    AndAnd,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `?`
    Question,
    /// `:`
    Colon,

    /// End of payload.
    Eof,
}

impl TokenKind {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("`{}`", name),
            TokenKind::Reference(path) => format!("reference `{}`", path),
            TokenKind::EnvVar(name) => format!("`${}`", name),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::True => "`true`".to_string(),
            TokenKind::False => "`false`".to_string(),
            TokenKind::Null => "`nil`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::OrOr => "`||`".to_string(),
            TokenKind::AndAnd => "`&&`".to_string(),
            TokenKind::EqEq => "`==`".to_string(),
            TokenKind::NotEq => "`!=`".to_string(),
            TokenKind::Lt => "`<`".to_string(),
            TokenKind::LtEq => "`<=`".to_string(),
            TokenKind::Gt => "`>`".to_string(),
            TokenKind::GtEq => "`>=`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::Percent => "`%`".to_string(),
            TokenKind::Bang => "`!`".to_string(),
            TokenKind::Question => "`?`".to_string(),
            TokenKind::Colon => "`:`".to_string(),
            TokenKind::Eof => "end of expression".to_string(),
        }
    }

    /// True for the binary-operator kinds the parser climbs over.
    pub fn is_binary_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::OrOr
                | TokenKind::AndAnd
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
        )
    }
}

/// A token with its raw lexeme and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Pos,
}

impl Token {
    /// Create a token.
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(TokenKind::Ident("grab".into()).describe(), "`grab`");
        assert_eq!(TokenKind::OrOr.describe(), "`||`");
        assert_eq!(TokenKind::Eof.describe(), "end of expression");
    }

    #[test]
    fn test_is_binary_operator() {
        assert!(TokenKind::Plus.is_binary_operator());
        assert!(TokenKind::OrOr.is_binary_operator());
        assert!(!TokenKind::Bang.is_binary_operator());
        assert!(!TokenKind::LParen.is_binary_operator());
    }
}
