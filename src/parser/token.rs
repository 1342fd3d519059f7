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

//! Token types for the expression lexer
//!
//! This module defines the token types used by the lexer and parser.

use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::LazyLock;

/// Position represents a position in the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset, starting at 0
    pub offset: usize,
    /// Line number, starting at 1
    pub line: usize,
    /// Column number, starting at 1
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.offset)
    }
}

/// TokenType represents the type of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Error token
    Error,
    /// End of input
    Eof,
    /// Integer literal
    Long,
    /// Floating point literal (a `.` or exponent forces this)
    Double,
    /// Boolean literal `T` / `F`
    Bool,
    /// String literal; the literal field holds the unquoted content
    Str,
    /// Bit-string literal `b'...'`; the literal field holds the bits
    Bits,
    /// Identifier (column or function name)
    Ident,
    /// Column reference by number, `#N`; the literal field holds the digits
    ColNum,
    /// The running row number, `#ROW`
    RowRef,
    /// Operator (`+`, `==`, `&&`, `AND`, ...)
    Operator,
    /// Punctuator (`(`, `)`, `[`, `]`, `,`)
    Punctuator,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Error => write!(f, "ERROR"),
            TokenType::Eof => write!(f, "EOF"),
            TokenType::Long => write!(f, "LONG"),
            TokenType::Double => write!(f, "DOUBLE"),
            TokenType::Bool => write!(f, "BOOLEAN"),
            TokenType::Str => write!(f, "STRING"),
            TokenType::Bits => write!(f, "BITSTR"),
            TokenType::Ident => write!(f, "IDENT"),
            TokenType::ColNum => write!(f, "COLUMN"),
            TokenType::RowRef => write!(f, "ROWREF"),
            TokenType::Operator => write!(f, "OPERATOR"),
            TokenType::Punctuator => write!(f, "PUNCTUATOR"),
        }
    }
}

/// Token represents a lexical token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The type of the token
    pub token_type: TokenType,
    /// The literal string value
    pub literal: String,
    /// The position in the source
    pub position: Position,
    /// Error message (if token_type is Error)
    pub error: Option<String>,
}

impl Token {
    /// Create a new token
    pub fn new(token_type: TokenType, literal: impl Into<String>, position: Position) -> Self {
        Self {
            token_type,
            literal: literal.into(),
            position,
            error: None,
        }
    }

    /// Create an error token
    pub fn error(
        message: impl Into<String>,
        literal: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            token_type: TokenType::Error,
            literal: literal.into(),
            position,
            error: Some(message.into()),
        }
    }

    /// Create an EOF token
    pub fn eof(position: Position) -> Self {
        Self {
            token_type: TokenType::Eof,
            literal: String::new(),
            position,
            error: None,
        }
    }

    /// Check if this is an EOF token
    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::Eof
    }

    /// Check if this is an error token
    pub fn is_error(&self) -> bool {
        self.token_type == TokenType::Error
    }

    /// Check if this is an operator with the given value
    pub fn is_operator(&self, op: &str) -> bool {
        self.token_type == TokenType::Operator && self.literal == op
    }

    /// Check if this is a punctuator with the given value
    pub fn is_punctuator(&self, punct: &str) -> bool {
        self.token_type == TokenType::Punctuator && self.literal == punct
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token_type == TokenType::Error {
            write!(
                f,
                "{}: {} at {}",
                self.token_type,
                self.error.as_deref().unwrap_or("unknown error"),
                self.position
            )
        } else {
            write!(
                f,
                "{}: '{}' at {}",
                self.token_type, self.literal, self.position
            )
        }
    }
}

/// Symbolic operators, longest spellings included
pub static OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "^", // arithmetic; ^ is a POWER alias
    "==", "!=", "<", "<=", ">", ">=", // relational
    "&&", "||", "!", // logical
    "&", "|", "~", // bit / set
    "=", ":", // range syntax
];

/// Compiled operator set for O(1) lookups
static OPERATOR_SET: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    let mut set = FxHashSet::with_capacity_and_hasher(OPERATORS.len(), Default::default());
    for op in OPERATORS {
        set.insert(*op);
    }
    set
});

/// Check if a string is an operator
#[inline]
pub fn is_operator(s: &str) -> bool {
    OPERATOR_SET.contains(s)
}

/// Characters that can start or extend an operator
pub fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '^' | '=' | '!' | '<' | '>' | '&' | '|' | '~' | ':'
    )
}

/// Punctuators
pub static PUNCTUATORS: &[char] = &['(', ')', '[', ']', ','];

/// Check if a character is a punctuator
pub fn is_punctuator(c: char) -> bool {
    PUNCTUATORS.contains(&c)
}

/// Map a word to its operator spelling, case-insensitively
///
/// `AND`, `OR`, `NOT` are accepted alongside `&&`, `||`, `!`.
pub fn word_operator(word: &str) -> Option<&'static str> {
    if word.eq_ignore_ascii_case("AND") {
        Some("&&")
    } else if word.eq_ignore_ascii_case("OR") {
        Some("||")
    } else if word.eq_ignore_ascii_case("NOT") {
        Some("!")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new(TokenType::Long, "42", Position::new(0, 1, 1));
        assert_eq!(token.token_type, TokenType::Long);
        assert_eq!(token.literal, "42");
        assert!(!token.is_eof());
    }

    #[test]
    fn test_error_token() {
        let token = Token::error("unexpected character", "@", Position::new(5, 1, 6));
        assert!(token.is_error());
        assert_eq!(token.error, Some("unexpected character".to_string()));
    }

    #[test]
    fn test_eof_token() {
        let token = Token::eof(Position::new(10, 1, 11));
        assert!(token.is_eof());
        assert_eq!(token.literal, "");
    }

    #[test]
    fn test_is_operator() {
        assert!(is_operator("**"));
        assert!(is_operator("<="));
        assert!(is_operator("&&"));
        assert!(is_operator("~"));
        assert!(is_operator(":"));
        assert!(!is_operator("<>"));
        assert!(!is_operator("->"));
    }

    #[test]
    fn test_is_punctuator() {
        assert!(is_punctuator('('));
        assert!(is_punctuator(']'));
        assert!(is_punctuator(','));
        assert!(!is_punctuator(';'));
    }

    #[test]
    fn test_word_operator() {
        assert_eq!(word_operator("and"), Some("&&"));
        assert_eq!(word_operator("OR"), Some("||"));
        assert_eq!(word_operator("Not"), Some("!"));
        assert_eq!(word_operator("XOR"), None);
    }

    #[test]
    fn test_token_display() {
        let op = Token::new(TokenType::Operator, "**", Position::new(3, 1, 4));
        assert!(op.to_string().contains("OPERATOR: '**'"));

        let err = Token::error("bad bit", "2", Position::new(0, 1, 1));
        assert!(err.to_string().contains("ERROR: bad bit"));
    }
}
