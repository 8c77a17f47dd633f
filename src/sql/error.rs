//! SQL syntax errors.

use std::fmt;

use super::token::{Pos, Token};

/// A syntax error with the offending token's lexeme and position.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    /// What the parser expected or what went wrong.
    pub message: String,
    /// The offending token's lexeme.
    pub token: String,
    /// 1-based line of the offending token.
    pub line: u32,
    /// 1-based column of the offending token.
    pub column: u32,
}

impl SyntaxError {
    /// Creates a syntax error at a position.
    pub fn new(message: impl Into<String>, token: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            token: token.into(),
            line: pos.line,
            column: pos.column,
        }
    }

    /// Creates an "expected X, found Y" error from a token.
    pub fn unexpected(expected: &str, found: &Token) -> Self {
        Self::new(
            format!("expected {expected}"),
            found.lexeme(),
            found.pos,
        )
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, found '{}' at line {}, column {}",
            self.message, self.token, self.line, self.column
        )
    }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::{Keyword, TokenKind};

    #[test]
    fn test_unexpected_reports_lexeme_and_position() {
        let token = Token::new(TokenKind::Keyword(Keyword::From), Pos::new(1, 8));
        let err = SyntaxError::unexpected("an expression", &token);
        assert_eq!(err.token, "FROM");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 8);
        assert_eq!(
            err.to_string(),
            "expected an expression, found 'FROM' at line 1, column 8"
        );
    }
}
