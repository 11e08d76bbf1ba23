//! Parse error types for the Rill parser.

use std::fmt;

use rill_common::error::LexError;
use rill_common::span::Span;

/// A parse error with location information and optional related span.
///
/// Lexer errors are folded into this type too, so consumers see a single
/// list of syntax problems per parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Primary source location where the error was detected.
    pub span: Span,
    /// Optional related location with context message (e.g., "block opened here").
    pub related: Option<(String, Span)>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            related: None,
        }
    }

    /// Create a parse error with a related span for additional context.
    pub fn with_related(
        message: impl Into<String>,
        span: Span,
        related_message: impl Into<String>,
        related_span: Span,
    ) -> Self {
        Self {
            message: message.into(),
            span,
            related: Some((related_message.into(), related_span)),
        }
    }

    /// Move the error (and its related span) by `delta` bytes.
    pub fn shifted(mut self, delta: i64) -> Self {
        self.span = self.span.shift(delta);
        if let Some((_, span)) = &mut self.related {
            *span = span.shift(delta);
        }
        self
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.kind.to_string(), err.span)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_common::error::LexErrorKind;

    #[test]
    fn parse_error_with_related() {
        let err = ParseError::with_related(
            "expected `}`",
            Span::new(50, 50),
            "block opened here",
            Span::new(10, 11),
        );
        assert_eq!(err.to_string(), "expected `}`");
        let (msg, span) = err.related.unwrap();
        assert_eq!(msg, "block opened here");
        assert_eq!(span, Span::new(10, 11));
    }

    #[test]
    fn shifted_moves_both_spans() {
        let err = ParseError::with_related("x", Span::new(20, 22), "y", Span::new(4, 5)).shifted(3);
        assert_eq!(err.span, Span::new(23, 25));
        assert_eq!(err.related.unwrap().1, Span::new(7, 8));
    }

    #[test]
    fn lex_errors_convert() {
        let lex = LexError::new(LexErrorKind::UnterminatedString, Span::new(3, 9));
        let err = ParseError::from(lex);
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.span, Span::new(3, 9));
    }
}
