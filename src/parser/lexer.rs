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

//! Expression lexer (tokenizer)
//!
//! This module provides the lexer for tokenizing expression strings.
//! Input is ASCII; whitespace is insignificant except as a separator.
//! There is no comment syntax.

use crate::core::EngineConfig;

use super::token::{
    is_operator, is_operator_char, is_punctuator, word_operator, Position, Token, TokenType,
};

/// Expression lexer for tokenizing input
pub struct Lexer {
    /// Input string
    input: Vec<char>,
    /// Current position in input (points to current char)
    position: usize,
    /// Current reading position in input (after current char)
    read_position: usize,
    /// Current character under examination
    ch: char,
    /// Current position tracking
    pos: Position,
    /// Literal length limits
    config: EngineConfig,
}

impl Lexer {
    /// Create a new lexer with default limits
    pub fn new(input: &str) -> Self {
        Self::with_config(input, EngineConfig::default())
    }

    /// Create a new lexer with explicit limits
    pub fn with_config(input: &str, config: EngineConfig) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut lexer = Self {
            input: chars,
            position: 0,
            read_position: 0,
            ch: '\0',
            pos: Position::new(0, 1, 1),
            config,
        };
        lexer.read_char();
        lexer
    }

    /// Read the next character
    fn read_char(&mut self) {
        if self.ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else if self.ch != '\0' {
            self.pos.column += 1;
        }

        if self.read_position >= self.input.len() {
            self.ch = '\0'; // EOF
            self.position = self.input.len();
        } else {
            self.ch = self.input[self.read_position];
            self.position = self.read_position;
            self.read_position += 1;
        }

        self.pos.offset = self.position;
    }

    /// Peek at the next character without advancing
    fn peek_char(&self) -> char {
        if self.read_position >= self.input.len() {
            '\0'
        } else {
            self.input[self.read_position]
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let pos = self.pos;

        match self.ch {
            '\0' => Token::eof(pos),

            // String literal, single- or double-quoted
            '\'' | '"' => self.read_string_literal(pos),

            // Bit-string literal b'...'
            'b' | 'B' if self.peek_char() == '\'' || self.peek_char() == '"' => {
                self.read_bits_literal(pos)
            }

            // Column-by-number #N or row reference #ROW
            '#' => self.read_hash(pos),

            // Number literal; a '.' or exponent forces DOUBLE
            c if c.is_ascii_digit() => self.read_number(pos),
            '.' if self.peek_char().is_ascii_digit() => self.read_number(pos),

            // Punctuator
            c if is_punctuator(c) => {
                self.read_char();
                Token::new(TokenType::Punctuator, c.to_string(), pos)
            }

            // Operator
            c if is_operator_char(c) => self.read_operator(pos),

            // Identifier, boolean literal, or word operator
            c if c.is_ascii_alphabetic() || c == '_' => {
                let literal = self.read_identifier();
                if literal.eq_ignore_ascii_case("T") {
                    Token::new(TokenType::Bool, "T", pos)
                } else if literal.eq_ignore_ascii_case("F") {
                    Token::new(TokenType::Bool, "F", pos)
                } else if let Some(op) = word_operator(&literal) {
                    Token::new(TokenType::Operator, op, pos)
                } else {
                    Token::new(TokenType::Ident, literal, pos)
                }
            }

            // Unrecognized character
            c => {
                self.read_char();
                Token::error(
                    format!("unrecognized character: {:?}", c),
                    c.to_string(),
                    pos,
                )
            }
        }
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while self.ch.is_whitespace() {
            self.read_char();
        }
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        result.push(self.ch);
        self.read_char();

        while self.ch.is_ascii_alphanumeric() || self.ch == '_' {
            result.push(self.ch);
            self.read_char();
        }

        result
    }

    /// Read a number; LONG unless a decimal point or exponent appears
    fn read_number(&mut self, pos: Position) -> Token {
        let mut result = String::new();
        let mut is_double = self.ch == '.';
        result.push(self.ch);
        self.read_char();

        while self.ch.is_ascii_digit() {
            result.push(self.ch);
            self.read_char();
        }

        if self.ch == '.' && !is_double {
            is_double = true;
            result.push(self.ch);
            self.read_char();
            while self.ch.is_ascii_digit() {
                result.push(self.ch);
                self.read_char();
            }
        }

        if self.ch == 'e' || self.ch == 'E' {
            is_double = true;
            result.push(self.ch);
            self.read_char();

            if self.ch == '+' || self.ch == '-' {
                result.push(self.ch);
                self.read_char();
            }

            if !self.ch.is_ascii_digit() {
                return Token::error("exponent has no digits", result, pos);
            }
            while self.ch.is_ascii_digit() {
                result.push(self.ch);
                self.read_char();
            }
        }

        if is_double {
            Token::new(TokenType::Double, result, pos)
        } else {
            Token::new(TokenType::Long, result, pos)
        }
    }

    /// Read a string literal; the token literal is the unquoted content
    fn read_string_literal(&mut self, pos: Position) -> Token {
        let quote = self.ch;
        let mut result = String::new();
        self.read_char(); // consume opening quote

        loop {
            if self.ch == '\0' {
                return Token::error("unterminated string literal", result, pos);
            } else if self.ch == quote {
                // Doubled quote is an escaped quote
                if self.peek_char() == quote {
                    result.push(quote);
                    self.read_char();
                    self.read_char();
                } else {
                    self.read_char();
                    break;
                }
            } else {
                result.push(self.ch);
                self.read_char();
            }
        }

        if result.len() > self.config.max_string_len {
            return Token::error(
                format!(
                    "string literal longer than {} characters",
                    self.config.max_string_len
                ),
                result,
                pos,
            );
        }

        Token::new(TokenType::Str, result, pos)
    }

    /// Read a bit-string literal b'...' over {0, 1, x, X}
    fn read_bits_literal(&mut self, pos: Position) -> Token {
        self.read_char(); // consume 'b'
        let quote = self.ch;
        let mut result = String::new();
        self.read_char(); // consume opening quote

        loop {
            if self.ch == '\0' {
                return Token::error("unterminated bit-string literal", result, pos);
            } else if self.ch == quote {
                self.read_char();
                break;
            } else {
                match self.ch {
                    '0' | '1' => result.push(self.ch),
                    'x' | 'X' => result.push('x'),
                    c => {
                        return Token::error(
                            format!("invalid bit-string character: {:?}", c),
                            c.to_string(),
                            pos,
                        );
                    }
                }
                self.read_char();
            }
        }

        if result.len() > self.config.max_bits_len {
            return Token::error(
                format!(
                    "bit-string literal longer than {} bits",
                    self.config.max_bits_len
                ),
                result,
                pos,
            );
        }

        Token::new(TokenType::Bits, result, pos)
    }

    /// Read a `#`-prefixed token: `#N` column reference or `#ROW`
    fn read_hash(&mut self, pos: Position) -> Token {
        self.read_char(); // consume '#'

        if self.ch.is_ascii_digit() {
            let mut digits = String::new();
            while self.ch.is_ascii_digit() {
                digits.push(self.ch);
                self.read_char();
            }
            return Token::new(TokenType::ColNum, digits, pos);
        }

        if self.ch.is_ascii_alphabetic() {
            let word = self.read_identifier();
            if word.eq_ignore_ascii_case("ROW") {
                return Token::new(TokenType::RowRef, "#ROW", pos);
            }
            return Token::error(format!("unknown reference: #{}", word), word, pos);
        }

        Token::error("expected column number or ROW after '#'", "#", pos)
    }

    /// Read an operator, preferring the longest spelling
    fn read_operator(&mut self, pos: Position) -> Token {
        let first_char = self.ch;
        let mut result = String::new();
        result.push(first_char);
        self.read_char();

        if self.ch != '\0' {
            let two_chars: String = [first_char, self.ch].iter().collect();
            if is_operator(&two_chars) {
                result.push(self.ch);
                self.read_char();
            }
        }

        if is_operator(&result) {
            Token::new(TokenType::Operator, result, pos)
        } else {
            Token::error(format!("unrecognized operator: {}", result), result, pos)
        }
    }
}
