//! Engine error taxonomy and user-facing rendering.
//!
//! Every failure the engine can produce is one of the tagged kinds below.
//! Errors carry a [`Pos`] where one is available so diagnostics can point
//! into the original expression text, and evaluation errors chain their
//! inner cause so a failure deep inside a nested call keeps its position.

use thiserror::Error;

use crate::span::Pos;

/// The engine-wide error type.
///
/// Kinds map one-to-one onto the failure classes the evaluator reports:
/// syntax problems from the tokenizer/parser, semantic misuse of an
/// operator, dangling references, operator run failures, collaborator
/// failures, dependency cycles, and unsatisfied required parameters.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed expression text: unexpected token, unterminated string,
    /// unclosed parenthesis, missing ternary `:`.
    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: Pos, message: String },

    /// An operator was applied to an argument of the wrong semantic kind.
    #[error("type error at {pos}: {message}")]
    Type { pos: Pos, message: String },

    /// A cursor resolved to nothing, or to a value the operator rejects.
    #[error("reference error at {pos}: `{path}` {message}")]
    Reference {
        pos: Pos,
        path: String,
        message: String,
    },

    /// An operator's run failed; wraps the inner cause when the failure
    /// happened inside a nested expression.
    #[error("evaluation error at {pos}: {message}")]
    Evaluation {
        pos: Pos,
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// A collaborator (secret store, file system, cloud service) failed
    /// after its retry budget was exhausted.
    #[error("external error from {subsystem}: {message} ({attempts} attempts)")]
    External {
        subsystem: String,
        message: String,
        attempts: u32,
    },

    /// A dependency cycle. Lists every cursor on the cycle, in order.
    #[error("cycle detected: {}", cursors.join(" -> "))]
    Cycle { cursors: Vec<String> },

    /// A required parameter survived all merges.
    #[error("validation error at `{path}`: {message}")]
    Validation { path: String, message: String },

    /// Aggregation of recoverable errors collected under an error budget.
    #[error("{} errors occurred", errors.len())]
    Multi { errors: Vec<Error> },
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a syntax error.
    pub fn syntax(pos: Pos, message: impl Into<String>) -> Self {
        Error::Syntax {
            pos,
            message: message.into(),
        }
    }

    /// Shorthand for a type error.
    pub fn type_error(pos: Pos, message: impl Into<String>) -> Self {
        Error::Type {
            pos,
            message: message.into(),
        }
    }

    /// Shorthand for a reference error.
    pub fn reference(pos: Pos, path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Reference {
            pos,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an evaluation error with no inner cause.
    pub fn evaluation(pos: Pos, message: impl Into<String>) -> Self {
        Error::Evaluation {
            pos,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap this error as the cause of an outer evaluation failure.
    pub fn chained(self, pos: Pos, message: impl Into<String>) -> Self {
        Error::Evaluation {
            pos,
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    /// The position this error points at, when it carries one.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Error::Syntax { pos, .. }
            | Error::Type { pos, .. }
            | Error::Reference { pos, .. }
            | Error::Evaluation { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    /// True for kinds that abort evaluation regardless of any error budget.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Cycle { .. } | Error::Validation { .. })
    }

    /// Human-readable kind label used by the renderer.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Syntax { .. } => "syntax error",
            Error::Type { .. } => "type error",
            Error::Reference { .. } => "reference error",
            Error::Evaluation { .. } => "evaluation error",
            Error::External { .. } => "external error",
            Error::Cycle { .. } => "cycle error",
            Error::Validation { .. } => "validation error",
            Error::Multi { .. } => "multiple errors",
        }
    }
}

/// Render an error against its originating expression text.
///
/// Produces the multi-line diagnostic form: kind and position, the source
/// line, a caret under the offending column, an optional context hint, and
/// the chained cause indented below.
///
/// # Examples
///
/// ```
/// use weft_util::{render_error, Error, Pos};
///
/// let err = Error::syntax(Pos::new(1, 8, 7), "unterminated string literal");
/// let out = render_error(&err, Some("grab \"ab"), Some("close the string with `\"`"));
/// assert!(out.starts_with("syntax error at 1:8: unterminated string literal"));
/// assert!(out.contains("grab \"ab"));
/// ```
pub fn render_error(err: &Error, source: Option<&str>, hint: Option<&str>) -> String {
    let mut out = String::new();
    render_into(&mut out, err, source, hint, 0);
    out
}

fn render_into(out: &mut String, err: &Error, source: Option<&str>, hint: Option<&str>, depth: usize) {
    let indent = "  ".repeat(depth);

    match err {
        Error::Multi { errors } => {
            out.push_str(&format!("{}{} errors:\n", indent, errors.len()));
            for e in errors {
                render_into(out, e, source, None, depth + 1);
                out.push('\n');
            }
            return;
        }
        _ => {
            out.push_str(&indent);
            out.push_str(&err.to_string());
        }
    }

    if let (Some(pos), Some(src)) = (err.pos(), source) {
        if !pos.is_dummy() {
            if let Some(line) = src.lines().nth(pos.line as usize - 1) {
                out.push('\n');
                out.push_str(&indent);
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
                out.push_str(&indent);
                out.push_str("  ");
                for _ in 1..pos.column {
                    out.push(' ');
                }
                out.push('^');
            }
        }
    }

    if let Some(h) = hint {
        out.push('\n');
        out.push_str(&indent);
        out.push_str("  context: ");
        out.push_str(h);
    }

    if let Error::Evaluation {
        cause: Some(inner), ..
    } = err
    {
        out.push('\n');
        out.push_str(&indent);
        out.push_str("  caused by: ");
        let mut nested = String::new();
        render_into(&mut nested, inner, source, None, 0);
        // Indent continuation lines of the nested rendering.
        for (i, line) in nested.lines().enumerate() {
            if i > 0 {
                out.push('\n');
                out.push_str(&indent);
                out.push_str("  ");
            }
            out.push_str(line);
        }
    }
}
