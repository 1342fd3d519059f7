// Copyright 2025 Rowexpr Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parser error types
//!
//! A failed parse produces exactly one [`ParseError`] carrying the kind,
//! a message, and the offending position; all tree nodes built so far are
//! discarded with it.

use super::token::Position;
use std::fmt;

/// Classification of a parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// Lexer rejected a token, or a token arrived where none was expected
    Syntax,
    /// Operand kinds incompatible and not fixable by promotion
    TypeMismatch,
    /// Binary operation on two non-scalar operands of different shape
    ShapeMismatch,
    /// Function name outside the built-in set
    UnknownFunction,
    /// Wrong argument count for a built-in function
    WrongArity,
    /// Column name or number not present in the catalog
    UnknownColumn,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Syntax => write!(f, "syntax error"),
            ParseErrorKind::TypeMismatch => write!(f, "type mismatch"),
            ParseErrorKind::ShapeMismatch => write!(f, "shape mismatch"),
            ParseErrorKind::UnknownFunction => write!(f, "unknown function"),
            ParseErrorKind::WrongArity => write!(f, "wrong argument count"),
            ParseErrorKind::UnknownColumn => write!(f, "unknown column"),
        }
    }
}

/// A single parse error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Failure classification
    pub kind: ParseErrorKind,
    /// Error message
    pub message: String,
    /// Position in source
    pub position: Position,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
        }
    }

    /// Create a syntax error
    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self::new(ParseErrorKind::Syntax, message, position)
    }

    /// Format the error with a caret pointing into the source line
    pub fn format_error(&self, source: &str) -> String {
        let line = source.lines().nth(self.position.line - 1).unwrap_or("");
        if line.is_empty() {
            return self.to_string();
        }
        let pointer = " ".repeat(self.position.column.saturating_sub(1)) + "^";
        format!("{}\n{}\n{}", self, line, pointer)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.kind, self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::syntax("unexpected token ')'", Position::new(10, 1, 11));
        assert_eq!(
            err.to_string(),
            "syntax error: unexpected token ')' at offset 10"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ParseErrorKind::TypeMismatch.to_string(), "type mismatch");
        assert_eq!(
            ParseErrorKind::UnknownFunction.to_string(),
            "unknown function"
        );
    }

    #[test]
    fn test_format_error_caret() {
        let source = "X + )";
        let err = ParseError::syntax("unexpected token ')'", Position::new(4, 1, 5));
        let formatted = err.format_error(source);
        assert!(formatted.contains("X + )"));
        assert!(formatted.ends_with("    ^"));
    }

    #[test]
    fn test_error_equality() {
        let a = ParseError::syntax("msg", Position::new(0, 1, 1));
        let b = ParseError::syntax("msg", Position::new(0, 1, 1));
        assert_eq!(a, b);
    }
}
