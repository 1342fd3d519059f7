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

//! Expression parser
//!
//! A Pratt parser over the lexer's token stream. The parser never builds
//! an AST of its own: it drives [`TreeBuilder`](crate::tree::build) node
//! construction directly, so type checking, promotion and constant
//! folding happen while parsing. Column identifiers are resolved against
//! the host catalog; the column's kind decides which operators accept it.

use crate::core::{ColumnCatalog, EngineConfig, Scalar};
use crate::functions::FuncOp;
use crate::tree::build::TreeBuilder;
use crate::tree::{BinaryOp, CompiledExpr, NodeId, UnaryOp};

use super::error::{ParseError, ParseErrorKind};
use super::lexer::Lexer;
use super::precedence::Precedence;
use super::token::{Position, Token, TokenType};

/// Expression parser
pub struct Parser<'a> {
    lexer: Lexer,
    cur_token: Token,
    peek_token: Token,
    catalog: &'a dyn ColumnCatalog,
    builder: TreeBuilder,
}

impl<'a> Parser<'a> {
    /// Create a parser over `input`, resolving columns via `catalog`
    pub fn new(
        input: &str,
        catalog: &'a dyn ColumnCatalog,
        config: EngineConfig,
    ) -> Result<Self, ParseError> {
        let mut lexer = Lexer::with_config(input, config.clone());
        let cur_token = lexer.next_token();
        let peek_token = lexer.next_token();
        let mut parser = Self {
            lexer,
            cur_token,
            peek_token,
            catalog,
            builder: TreeBuilder::new(config),
        };
        parser.check_token_error()?;
        Ok(parser)
    }

    /// Parse the whole input into a compiled expression tree
    pub fn parse(mut self, source: String) -> Result<CompiledExpr, ParseError> {
        if self.cur_token.is_eof() {
            return Err(ParseError::syntax("empty expression", self.cur_token.position));
        }
        let root = self.parse_expression(Precedence::Lowest)?;
        if !self.peek_token.is_eof() {
            return Err(ParseError::syntax(
                format!("unexpected token {}", self.peek_token),
                self.peek_token.position,
            ));
        }
        Ok(self.builder.finish(root, source))
    }

    /// Advance one token, surfacing lexer errors
    fn next_token(&mut self) -> Result<(), ParseError> {
        self.cur_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
        self.check_token_error()
    }

    fn check_token_error(&self) -> Result<(), ParseError> {
        if self.cur_token.is_error() {
            return Err(ParseError::syntax(
                self.cur_token
                    .error
                    .clone()
                    .unwrap_or_else(|| "invalid token".to_string()),
                self.cur_token.position,
            ));
        }
        Ok(())
    }

    /// Consume the peek token if it is the given punctuator
    fn expect_peek_punct(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.peek_token.is_punctuator(punct) {
            self.next_token()
        } else {
            Err(ParseError::syntax(
                format!("expected '{}', found {}", punct, self.peek_token),
                self.peek_token.position,
            ))
        }
    }

    fn peek_precedence(&self) -> Precedence {
        match self.peek_token.token_type {
            TokenType::Operator => Precedence::for_operator(&self.peek_token.literal),
            TokenType::Punctuator if self.peek_token.literal == "[" => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }

    /// Check if the peek token can continue an expression as an infix
    fn is_infix_token(&self) -> bool {
        match self.peek_token.token_type {
            TokenType::Operator => !matches!(self.peek_token.literal.as_str(), "!" | "~" | ":"),
            TokenType::Punctuator => self.peek_token.literal == "[",
            _ => false,
        }
    }

    /// Parse an expression with the given precedence
    ///
    /// Enters with `cur_token` at the expression's first token, returns
    /// with `cur_token` at its last.
    fn parse_expression(&mut self, precedence: Precedence) -> Result<NodeId, ParseError> {
        let mut left = self.parse_prefix()?;

        while !self.peek_token.is_eof() && precedence < self.peek_precedence() {
            if !self.is_infix_token() {
                return Ok(left);
            }
            self.next_token()?;
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    /// Parse a prefix expression (literals, columns, unary operators, ...)
    fn parse_prefix(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        match self.cur_token.token_type {
            TokenType::Long => {
                let value = self.cur_token.literal.parse::<i64>().map_err(|e| {
                    ParseError::syntax(
                        format!("invalid integer literal {}: {}", self.cur_token.literal, e),
                        pos,
                    )
                })?;
                Ok(self.builder.new_const(Scalar::Long(value)))
            }
            TokenType::Double => {
                let value = self.cur_token.literal.parse::<f64>().map_err(|e| {
                    ParseError::syntax(
                        format!("invalid float literal {}: {}", self.cur_token.literal, e),
                        pos,
                    )
                })?;
                Ok(self.builder.new_const(Scalar::Double(value)))
            }
            TokenType::Bool => {
                let value = self.cur_token.literal == "T";
                Ok(self.builder.new_const(Scalar::Bool(value)))
            }
            TokenType::Str => {
                let value = self.cur_token.literal.clone();
                Ok(self.builder.new_const(Scalar::Str(value)))
            }
            TokenType::Bits => {
                let value = self.cur_token.literal.clone();
                Ok(self.builder.new_const(Scalar::Bits(value)))
            }
            TokenType::Ident => {
                if self.peek_token.is_punctuator("(") {
                    self.parse_function_call()
                } else {
                    self.parse_column_by_name()
                }
            }
            TokenType::ColNum => self.parse_column_by_number(),
            TokenType::RowRef => Ok(self.builder.new_row_ref()),
            TokenType::Operator => self.parse_unary(),
            TokenType::Punctuator if self.cur_token.literal == "(" => self.parse_group_or_cast(),
            _ => Err(ParseError::syntax(
                format!("unexpected token {}", self.cur_token),
                pos,
            )),
        }
    }

    /// Parse a unary operator expression
    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        let op = match self.cur_token.literal.as_str() {
            "-" => Some(UnaryOp::Neg),
            "+" => None, // unary plus is a no-op
            "!" => Some(UnaryOp::Not),
            "~" => Some(UnaryOp::BitNot),
            other => {
                return Err(ParseError::syntax(
                    format!("unexpected operator '{}'", other),
                    pos,
                ));
            }
        };
        self.next_token()?;
        let operand = self.parse_expression(Precedence::Prefix)?;
        match op {
            Some(op) => self.builder.new_unary(op, operand, pos),
            None => Ok(operand),
        }
    }

    /// Parse a parenthesized group or a `(int)` / `(float)` cast
    fn parse_group_or_cast(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;

        // A cast is '(' followed by a cast keyword followed by ')'
        if self.peek_token.token_type == TokenType::Ident {
            let word = self.peek_token.literal.clone();
            let cast = if word.eq_ignore_ascii_case("int") {
                Some(UnaryOp::CastLong)
            } else if word.eq_ignore_ascii_case("float") {
                Some(UnaryOp::CastDouble)
            } else {
                None
            };
            if let Some(cast) = cast {
                self.next_token()?; // cur = cast keyword
                if self.peek_token.is_punctuator(")") {
                    self.next_token()?; // cur = ')'
                    self.next_token()?; // cur = operand start
                    let operand = self.parse_expression(Precedence::Prefix)?;
                    return self.builder.new_unary(cast, operand, pos);
                }
                // Not a cast after all: 'int'/'float' is a column name here
                let left = self.parse_column_by_name()?;
                let expr = self.continue_group(left)?;
                return Ok(expr);
            }
        }

        self.next_token()?;
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek_punct(")")?;
        Ok(expr)
    }

    /// Finish a parenthesized expression whose first term is parsed
    fn continue_group(&mut self, left: NodeId) -> Result<NodeId, ParseError> {
        let mut left = left;
        while !self.peek_token.is_eof() && Precedence::Lowest < self.peek_precedence() {
            if !self.is_infix_token() {
                break;
            }
            self.next_token()?;
            left = self.parse_infix(left)?;
        }
        self.expect_peek_punct(")")?;
        Ok(left)
    }

    /// Resolve the current identifier as a column reference
    fn parse_column_by_name(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        let name = self.cur_token.literal.clone();
        let idx = self.catalog.lookup(&name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnknownColumn,
                format!("column '{}' not found", name),
                pos,
            )
        })?;
        let info = self
            .catalog
            .col_info(idx)
            .cloned()
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::UnknownColumn,
                    format!("column '{}' has no metadata", name),
                    pos,
                )
            })?;
        self.builder.new_column(idx, &info, pos)
    }

    /// Resolve a `#N` reference (1-based) as a column reference
    fn parse_column_by_number(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        let number = self.cur_token.literal.parse::<usize>().map_err(|e| {
            ParseError::syntax(format!("invalid column number: {}", e), pos)
        })?;
        if number == 0 || number > self.catalog.ncols() {
            return Err(ParseError::new(
                ParseErrorKind::UnknownColumn,
                format!("column #{} not found", number),
                pos,
            ));
        }
        let idx = number - 1;
        let info = self
            .catalog
            .col_info(idx)
            .cloned()
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::UnknownColumn,
                    format!("column #{} has no metadata", number),
                    pos,
                )
            })?;
        self.builder.new_column(idx, &info, pos)
    }

    /// Parse a function call; the current token is the function name
    fn parse_function_call(&mut self) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        let name = self.cur_token.literal.clone();
        let op = FuncOp::lookup(&name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnknownFunction,
                format!("Function {}(...) not supported", name),
                pos,
            )
        })?;

        self.next_token()?; // cur = '('

        let mut args = Vec::new();
        if self.peek_token.is_punctuator(")") {
            self.next_token()?;
        } else {
            loop {
                self.next_token()?;
                args.push(self.parse_expression(Precedence::Lowest)?);
                if self.peek_token.is_punctuator(",") {
                    self.next_token()?;
                    continue;
                }
                self.expect_peek_punct(")")?;
                break;
            }
        }

        self.builder.new_func(op, args, pos)
    }

    /// Parse an infix expression; the current token is the operator
    fn parse_infix(&mut self, left: NodeId) -> Result<NodeId, ParseError> {
        if self.cur_token.is_punctuator("[") {
            return self.parse_subscript(left);
        }

        let pos = self.cur_token.position;
        let literal = self.cur_token.literal.clone();

        if literal == "=" {
            return self.parse_range_or_equality(left, pos);
        }

        let op = match literal.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" | "^" => BinaryOp::Pow,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            other => {
                return Err(ParseError::syntax(
                    format!("unexpected operator '{}'", other),
                    pos,
                ));
            }
        };

        // Exponentiation is right-associative: its right side binds one
        // level lower
        let rhs_precedence = if op == BinaryOp::Pow {
            Precedence::BitSet
        } else {
            Precedence::for_operator(&literal)
        };

        self.next_token()?;
        let right = self.parse_expression(rhs_precedence)?;
        self.builder.new_binary(op, left, right, pos)
    }

    /// Parse `left = value` or the range form `left = lo : hi`
    ///
    /// The range desugars to `(lo <= left) && (left <= hi)`. The bounds
    /// bind tighter than the logical connectives, so a trailing `&&`
    /// applies to the desugared boolean.
    fn parse_range_or_equality(
        &mut self,
        left: NodeId,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        self.next_token()?;
        let lo = self.parse_expression(Precedence::And)?;

        if self.peek_token.is_operator(":") {
            self.next_token()?; // cur = ':'
            self.next_token()?; // cur = start of hi
            let hi = self.parse_expression(Precedence::And)?;
            let lower = self.builder.new_binary(BinaryOp::Le, lo, left, pos)?;
            let upper = self.builder.new_binary(BinaryOp::Le, left, hi, pos)?;
            return self.builder.new_binary(BinaryOp::And, lower, upper, pos);
        }

        self.builder.new_binary(BinaryOp::Eq, left, lo, pos)
    }

    /// Parse a subscript list; the current token is '['
    fn parse_subscript(&mut self, left: NodeId) -> Result<NodeId, ParseError> {
        let pos = self.cur_token.position;
        let mut dims = Vec::new();
        loop {
            self.next_token()?;
            dims.push(self.parse_expression(Precedence::Lowest)?);
            if self.peek_token.is_punctuator(",") {
                self.next_token()?;
                continue;
            }
            self.expect_peek_punct("]")?;
            break;
        }
        self.builder.new_deref(left, dims, pos)
    }
}
