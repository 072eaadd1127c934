//! weft-lex - Tokenizer for expression payloads.
//!
//! Turns the text between `((` and `))` into typed tokens with positions.
//! The tokenizer is direct-coded: each token family has its own lexing
//! method, dispatched on the first character.
//!
//! Lexical rules worth knowing:
//!
//! - References are lexed as one token: `a.b[0].c` and `jobs.web.port`
//!   are single `Reference` tokens. A bare name (`grab`, `meta`) is an
//!   `Ident`; the parser decides whether it heads an operator call.
//! - A hyphen continues a name only when the next character is a letter,
//!   so `base64-decode` is one name while `a - 1` is a subtraction.
//!   Subtraction between references needs spaces.
//! - The unary sign is never folded into a number: `-3` lexes as `-`
//!   then `3`.
//! - `nil` and `null` both lex to the null literal.

pub mod cursor;
pub mod token;

pub use cursor::Cursor;
pub use token::{Token, TokenKind};

use weft_util::{Error, Pos, Result};

/// Tokenizer over a single expression payload.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over a payload.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Lex the entire payload. The final token is always `Eof`.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_lex::{Lexer, TokenKind};
    ///
    /// let tokens = Lexer::new("grab a.b").tokenize().unwrap();
    /// assert_eq!(tokens[0].kind, TokenKind::Ident("grab".into()));
    /// assert_eq!(tokens[1].kind, TokenKind::Reference("a.b".into()));
    /// assert_eq!(tokens[2].kind, TokenKind::Eof);
    /// ```
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Produce the next token.
    fn next_token(&mut self) -> Result<Token> {
        self.cursor.skip_whitespace();

        let pos = self.cursor.pos();
        let start = self.cursor.position();

        if self.cursor.is_at_end() {
            return Ok(Token::new(TokenKind::Eof, "", pos));
        }

        let c = self.cursor.current_char();
        let kind = match c {
            '(' => {
                self.cursor.advance();
                TokenKind::LParen
            }
            ')' => {
                self.cursor.advance();
                TokenKind::RParen
            }
            ',' => {
                self.cursor.advance();
                TokenKind::Comma
            }
            '+' => {
                self.cursor.advance();
                TokenKind::Plus
            }
            '-' => {
                self.cursor.advance();
                TokenKind::Minus
            }
            '*' => {
                self.cursor.advance();
                TokenKind::Star
            }
            '/' => {
                self.cursor.advance();
                TokenKind::Slash
            }
            '%' => {
                self.cursor.advance();
                TokenKind::Percent
            }
            '?' => {
                self.cursor.advance();
                TokenKind::Question
            }
            ':' => {
                self.cursor.advance();
                TokenKind::Colon
            }
            '!' => {
                self.cursor.advance();
                if self.cursor.match_char('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                self.cursor.advance();
                if self.cursor.match_char('=') {
                    TokenKind::EqEq
                } else {
                    return Err(Error::syntax(pos, "unknown character `=`; did you mean `==`?"));
                }
            }
            '<' => {
                self.cursor.advance();
                if self.cursor.match_char('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.cursor.advance();
                if self.cursor.match_char('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                self.cursor.advance();
                if self.cursor.match_char('&') {
                    TokenKind::AndAnd
                } else {
                    return Err(Error::syntax(pos, "unknown character `&`; did you mean `&&`?"));
                }
            }
            '|' => {
                self.cursor.advance();
                if self.cursor.match_char('|') {
                    TokenKind::OrOr
                } else {
                    return Err(Error::syntax(pos, "unknown character `|`; did you mean `||`?"));
                }
            }
            '"' => return self.lex_string(pos, start),
            '$' => return self.lex_env_var(pos, start),
            c if c.is_ascii_digit() => return self.lex_number(pos, start),
            c if is_name_start(c) => return self.lex_name(pos, start),
            other => {
                return Err(Error::syntax(
                    pos,
                    format!("unknown character `{}`", other),
                ))
            }
        };

        Ok(Token::new(kind, self.cursor.slice_from(start), pos))
    }

    /// Lexes a quoted string, processing the escape set
    /// `\"  \\  \n  \t  \r`. Unknown escapes keep the escaped character.
    fn lex_string(&mut self, pos: Pos, start: usize) -> Result<Token> {
        self.cursor.advance(); // opening quote

        let mut content = String::new();
        loop {
            if self.cursor.is_at_end() {
                return Err(Error::syntax(pos, "unterminated string literal"));
            }

            let c = self.cursor.current_char();
            if c == '"' {
                self.cursor.advance();
                break;
            }

            if c == '\\' {
                self.cursor.advance();
                if self.cursor.is_at_end() {
                    return Err(Error::syntax(pos, "unterminated string literal"));
                }
                let escaped = self.cursor.current_char();
                self.cursor.advance();
                content.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            } else {
                content.push(c);
                self.cursor.advance();
            }
        }

        Ok(Token::new(
            TokenKind::Str(content),
            self.cursor.slice_from(start),
            pos,
        ))
    }

    /// Lexes `$NAME`.
    fn lex_env_var(&mut self, pos: Pos, start: usize) -> Result<Token> {
        self.cursor.advance(); // '$'

        let name_start = self.cursor.position();
        while is_name_continue(self.cursor.current_char()) {
            self.cursor.advance();
        }
        let name = self.cursor.slice_from(name_start);
        if name.is_empty() {
            return Err(Error::syntax(pos, "environment variable name is empty"));
        }

        Ok(Token::new(
            TokenKind::EnvVar(name.to_string()),
            self.cursor.slice_from(start),
            pos,
        ))
    }

    /// Lexes an unsigned integer or decimal literal.
    fn lex_number(&mut self, pos: Pos, start: usize) -> Result<Token> {
        while self.cursor.current_char().is_ascii_digit() {
            self.cursor.advance();
        }

        let mut is_float = false;
        if self.cursor.current_char() == '.' && self.cursor.peek_char(1).is_ascii_digit() {
            is_float = true;
            self.cursor.advance();
            while self.cursor.current_char().is_ascii_digit() {
                self.cursor.advance();
            }
        }

        let lexeme = self.cursor.slice_from(start);
        let kind = if is_float {
            let value: f64 = lexeme
                .parse()
                .map_err(|_| Error::syntax(pos, format!("bad number literal `{}`", lexeme)))?;
            TokenKind::Float(value)
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                // Integers past the 64-bit range degrade to floats.
                Err(_) => TokenKind::Float(lexeme.parse::<f64>().map_err(|_| {
                    Error::syntax(pos, format!("bad number literal `{}`", lexeme))
                })?),
            }
        };

        Ok(Token::new(kind, lexeme, pos))
    }

    /// Lexes an identifier, keyword, or reference path.
    fn lex_name(&mut self, pos: Pos, start: usize) -> Result<Token> {
        self.consume_name_segment();

        let mut is_reference = false;
        loop {
            match self.cursor.current_char() {
                '.' => {
                    let next = self.cursor.peek_char(1);
                    if !(is_name_start(next) || next.is_ascii_digit()) {
                        return Err(Error::syntax(
                            pos,
                            format!(
                                "malformed reference `{}.`: expected a path segment after `.`",
                                self.cursor.slice_from(start)
                            ),
                        ));
                    }
                    self.cursor.advance();
                    if self.cursor.current_char().is_ascii_digit() {
                        while self.cursor.current_char().is_ascii_digit() {
                            self.cursor.advance();
                        }
                    } else {
                        self.consume_name_segment();
                    }
                    is_reference = true;
                }
                '[' => {
                    self.cursor.advance();
                    let digits_start = self.cursor.position();
                    while self.cursor.current_char().is_ascii_digit() {
                        self.cursor.advance();
                    }
                    if self.cursor.position() == digits_start
                        || !self.cursor.match_char(']')
                    {
                        return Err(Error::syntax(
                            pos,
                            format!(
                                "malformed reference `{}`: expected `[<index>]`",
                                self.cursor.slice_from(start)
                            ),
                        ));
                    }
                    is_reference = true;
                }
                _ => break,
            }
        }

        let lexeme = self.cursor.slice_from(start);
        let kind = if is_reference {
            TokenKind::Reference(lexeme.to_string())
        } else {
            match lexeme {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "nil" | "null" => TokenKind::Null,
                _ => TokenKind::Ident(lexeme.to_string()),
            }
        };

        Ok(Token::new(kind, lexeme, pos))
    }

    fn consume_name_segment(&mut self) {
        loop {
            let c = self.cursor.current_char();
            let continues = is_name_continue(c)
                || (c == '-' && self.cursor.peek_char(1).is_ascii_alphabetic());
            if !continues {
                break;
            }
            self.cursor.advance();
        }
    }
}

/// Convenience wrapper: lex a payload in one call.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

#[inline]
fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    // =========================================================================
    // NAMES AND REFERENCES
    // =========================================================================

    #[test]
    fn test_bare_identifier() {
        assert_eq!(kinds("grab"), vec![TokenKind::Ident("grab".into()), TokenKind::Eof]);
    }

    #[test]
    fn test_hyphenated_operator_name() {
        assert_eq!(
            kinds("base64-decode"),
            vec![TokenKind::Ident("base64-decode".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_dotted_reference() {
        assert_eq!(
            kinds("a.b.c"),
            vec![TokenKind::Reference("a.b.c".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_indexed_reference() {
        assert_eq!(
            kinds("jobs[0].name"),
            vec![TokenKind::Reference("jobs[0].name".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_named_index_reference() {
        assert_eq!(
            kinds("jobs.web.port"),
            vec![TokenKind::Reference("jobs.web.port".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numeric_segment_reference() {
        assert_eq!(
            kinds("list.0"),
            vec![TokenKind::Reference("list.0".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(kinds("true"), vec![TokenKind::True, TokenKind::Eof]);
        assert_eq!(kinds("false"), vec![TokenKind::False, TokenKind::Eof]);
        assert_eq!(kinds("nil"), vec![TokenKind::Null, TokenKind::Eof]);
        assert_eq!(kinds("null"), vec![TokenKind::Null, TokenKind::Eof]);
    }

    #[test]
    fn test_malformed_reference_trailing_dot() {
        assert!(tokenize("a.b.").is_err());
    }

    #[test]
    fn test_malformed_reference_bad_index() {
        assert!(tokenize("a[x]").is_err());
        assert!(tokenize("a[1").is_err());
    }

    // =========================================================================
    // LITERALS
    // =========================================================================

    #[test]
    fn test_integer() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42), TokenKind::Eof]);
    }

    #[test]
    fn test_float() {
        assert_eq!(kinds("3.25"), vec![TokenKind::Float(3.25), TokenKind::Eof]);
    }

    #[test]
    fn test_negative_number_is_two_tokens() {
        assert_eq!(
            kinds("-3"),
            vec![TokenKind::Minus, TokenKind::Int(3), TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds(r#""hello world""#),
            vec![TokenKind::Str("hello world".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\nd\te\rf""#),
            vec![
                TokenKind::Str("a\"b\\c\nd\te\rf".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#""abc"#).unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }

    // =========================================================================
    // OPERATORS AND PUNCTUATION
    // =========================================================================

    #[test]
    fn test_all_operators() {
        assert_eq!(
            kinds("== != <= >= && || < > + - * / % ! ? : , ( )"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Bang,
                TokenKind::Question,
                TokenKind::Colon,
                TokenKind::Comma,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lone_ampersand_rejected() {
        assert!(tokenize("a & b").is_err());
    }

    #[test]
    fn test_lone_pipe_rejected() {
        assert!(tokenize("a | b").is_err());
    }

    // =========================================================================
    // ENVIRONMENT VARIABLES
    // =========================================================================

    #[test]
    fn test_env_var() {
        assert_eq!(
            kinds("$HOME"),
            vec![TokenKind::EnvVar("HOME".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_empty_env_var_rejected() {
        let err = tokenize("$ x").unwrap_err();
        assert!(err.to_string().contains("environment variable name"));
    }

    // =========================================================================
    // POSITIONS
    // =========================================================================

    #[test]
    fn test_positions() {
        let tokens = tokenize("grab  a.b").unwrap();
        assert_eq!(tokens[0].pos, Pos::new(1, 1, 0));
        assert_eq!(tokens[1].pos, Pos::new(1, 7, 6));
    }

    #[test]
    fn test_multiline_positions() {
        let tokens = tokenize("a ||\nb").unwrap();
        assert_eq!(tokens[2].pos.line, 2);
        assert_eq!(tokens[2].pos.column, 1);
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("a @ b").unwrap_err();
        assert!(err.to_string().contains("unknown character"));
    }

    // =========================================================================
    // WHOLE EXPRESSIONS
    // =========================================================================

    #[test]
    fn test_call_with_nested_parens() {
        assert_eq!(
            kinds(r#"grab (concat "config." meta.env ".host")"#),
            vec![
                TokenKind::Ident("grab".into()),
                TokenKind::LParen,
                TokenKind::Ident("concat".into()),
                TokenKind::Str("config.".into()),
                TokenKind::Reference("meta.env".into()),
                TokenKind::Str(".host".into()),
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_ternary_expression() {
        assert_eq!(
            kinds("flag ? a : b"),
            vec![
                TokenKind::Ident("flag".into()),
                TokenKind::Question,
                TokenKind::Ident("a".into()),
                TokenKind::Colon,
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }
}
