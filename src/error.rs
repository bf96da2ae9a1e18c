use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::lexer::{Token, TokenKind};

/// Malformed input found while scanning or parsing.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
#[error("[line {line}] Error{location}: {message}")]
#[diagnostic(code(xp::syntax))]
pub struct SyntaxError {
    pub line: usize,
    /// ` at 'x'`, ` at end`, or empty for errors raised by the lexer.
    pub location: String,
    pub message: String,
    #[label("here")]
    pub span: SourceSpan,
}

impl SyntaxError {
    pub fn at_char(line: usize, offset: usize, len: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            location: String::new(),
            message: message.into(),
            span: (offset, len).into(),
        }
    }

    pub fn at_token(token: &Token<'_>, message: impl Into<String>) -> Self {
        let location = if token.kind == TokenKind::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        Self {
            line: token.line,
            location,
            message: message.into(),
            span: (token.offset, token.lexeme.len()).into(),
        }
    }
}

/// Failure raised while evaluating a tree. Carries the line of the offending token.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
#[error("{message}\n[line {line}]")]
#[diagnostic(code(xp::runtime))]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
    #[label("while evaluating this")]
    pub span: SourceSpan,
}

impl RuntimeError {
    pub fn new(token: &Token<'_>, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            message: message.into(),
            span: (token.offset, token.lexeme.len()).into(),
        }
    }
}

/// Failure of a single operator application.
///
/// Kind mismatches only arise for the two non-data kinds (`Symbol`, `Callable`);
/// the five data kinds always coerce.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OpError {
    #[error("Operand of kind {0} has no numeric value.")]
    NotCoercible(&'static str),
    #[error("Operand must be a number.")]
    NotANumber,
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Exponent must not be negative.")]
    NegativeExponent,
    #[error("Exponent {0} is too large.")]
    ExponentTooLarge(String),
    #[error("Power of a negative base by a fractional exponent is not a real number.")]
    NotReal,
    #[error("Range bounds {0} and {1} span too many elements.")]
    RangeTooLarge(String, String),
    #[error("{0}")]
    Extension(String),
}

/// Syntax errors accumulated over one scan and parse.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Diagnostics {
    errors: Vec<SyntaxError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: SyntaxError) {
        tracing::debug!(line = error.line, message = %error.message, "syntax error");
        self.errors.push(error);
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SyntaxError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_text() {
        let err = SyntaxError::at_char(3, 10, 1, "Unexpected character.");
        assert_eq!(err.to_string(), "[line 3] Error: Unexpected character.");
    }

    #[test]
    fn test_syntax_error_at_token() {
        let token = Token {
            kind: TokenKind::RightParen,
            lexeme: ")",
            offset: 4,
            line: 1,
        };
        let err = SyntaxError::at_token(&token, "Expect expression.");
        assert_eq!(err.to_string(), "[line 1] Error at ')': Expect expression.");

        let eof = Token {
            kind: TokenKind::Eof,
            lexeme: "",
            offset: 7,
            line: 2,
        };
        let err = SyntaxError::at_token(&eof, "Expect ')' after expression.");
        assert_eq!(err.to_string(), "[line 2] Error at end: Expect ')' after expression.");
    }

    #[test]
    fn test_runtime_error_text() {
        let token = Token {
            kind: TokenKind::Minus,
            lexeme: "-",
            offset: 0,
            line: 5,
        };
        let err = RuntimeError::new(&token, "Operand must be a number.");
        assert_eq!(err.to_string(), "Operand must be a number.\n[line 5]");
    }

    #[test]
    fn test_diagnostics_flag() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.had_error());
        diagnostics.report(SyntaxError::at_char(1, 0, 1, "Unexpected character."));
        assert!(diagnostics.had_error());
        assert_eq!(diagnostics.errors().len(), 1);
    }
}
