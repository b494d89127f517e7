//! Quill Parse - turns template source into page fragments and expression
//! trees.
//!
//! - [`parse_expression`]: a single expression, including `|>` pipes
//! - [`parse_statements`]: a `;`/newline separated statement list
//! - [`parse_template`]: a whole page into [`quill_ir::PageFragment`]s
//!
//! Parsing never evaluates anything; every failure is a [`ParseError`] that
//! converts into a syntax-kind `EvalError`.

mod lexer;
mod parser;
mod template;

use quill_ir::Span;
use quill_value::errors::syntax_error;
use quill_value::EvalError;

pub use lexer::{lex, unescape, Token, TokenKind};
pub use parser::{parse_expression, parse_statements, parse_variable, Parser};
pub use template::{parse_template, TemplateSyntax};

/// Parse failure with the byte range it was detected at.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message} (at {}..{})", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }

    /// Shift the span by `offset`, for errors found in a slice of a page.
    #[must_use]
    pub fn offset_by(mut self, offset: usize) -> Self {
        let offset = u32::try_from(offset).unwrap_or(u32::MAX);
        self.span = Span::new(
            self.span.start.saturating_add(offset),
            self.span.end.saturating_add(offset),
        );
        self
    }
}

impl From<ParseError> for EvalError {
    fn from(err: ParseError) -> Self {
        syntax_error(err.to_string())
    }
}
