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
//! This module provides the complete parse pipeline, including:
//!
//! - [`Lexer`] - tokenizer for expression input
//! - [`Parser`] - Pratt parser driving tree construction
//! - [`token`] - token types
//! - [`error`] - parse error types
//!
//! # Example
//!
//! ```
//! use rowexpr::{parse, ColInfo, TableCatalog, ValueKind};
//!
//! let catalog = TableCatalog::from_cols(vec![
//!     ColInfo::scalar("X", ValueKind::Long),
//! ]);
//! let expr = parse("X * 2 + 1", &catalog).unwrap();
//! assert_eq!(expr.result_kind(), ValueKind::Long);
//! ```

pub mod error;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod precedence;
pub mod token;

use crate::core::{ColumnCatalog, EngineConfig};
use crate::tree::CompiledExpr;

// Re-export main types
pub use error::{ParseError, ParseErrorKind};
pub use lexer::Lexer;
pub use parser::Parser;
pub use precedence::Precedence;
pub use token::{is_operator, is_punctuator, Position, Token, TokenType, OPERATORS, PUNCTUATORS};

/// Parse an expression against a column catalog
///
/// This is the main entry point: an exhaustive parse, type check, and
/// constant fold. On failure every node built so far is discarded and a
/// single [`ParseError`] is returned.
pub fn parse(input: &str, catalog: &dyn ColumnCatalog) -> Result<CompiledExpr, ParseError> {
    parse_with_config(input, catalog, EngineConfig::default())
}

/// Parse an expression with explicit engine limits
pub fn parse_with_config(
    input: &str,
    catalog: &dyn ColumnCatalog,
    config: EngineConfig,
) -> Result<CompiledExpr, ParseError> {
    let trimmed = input.trim();
    let parser = Parser::new(trimmed, catalog, config)?;
    parser.parse(trimmed.to_string())
}

impl CompiledExpr {
    /// Parse an expression against a column catalog
    ///
    /// Equivalent to the free function [`parse`].
    pub fn parse(input: &str, catalog: &dyn ColumnCatalog) -> Result<Self, ParseError> {
        parse(input, catalog)
    }

    /// Parse an expression with explicit engine limits
    pub fn parse_with_config(
        input: &str,
        catalog: &dyn ColumnCatalog,
        config: EngineConfig,
    ) -> Result<Self, ParseError> {
        parse_with_config(input, catalog, config)
    }
}
