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

//! # rowexpr - vectorized row expression engine
//!
//! rowexpr compiles a small, statically typed expression language into a
//! tree that is evaluated once per batch of table rows at minimal
//! per-row cost. It is built for filtering rows, computing derived
//! columns, and feeding histogram binning over columnar table data with
//! full NULL propagation.
//!
//! ## Key features
//!
//! - **Five value kinds** - Bool, Long, Double, String, and BitStr with
//!   the strict numeric promotion lattice `Bool < Long < Double`
//! - **Vector columns** - up to 5 axes per column, scalar broadcasting,
//!   and 1-based subscripting with single-axis reduction
//! - **Null propagation** - per-element undef masks rebuilt per batch
//!   from column null sentinels, with `ISNULL` / `DEFNULL` and
//!   true-dominant `OR`
//! - **Bit-string arithmetic** - `{'0','1','x'}` streams with unknown
//!   absorption, concatenation, and integer ordering
//! - **Region predicates** - `NEAR`, `CIRCLE`, `BOX`, `ELLIPSE`
//! - **Constant folding** - literal-only subtrees collapse to a single
//!   constant node while parsing
//!
//! ## Quick start
//!
//! ```rust
//! use rowexpr::{parse, ColInfo, ColumnData, RowBatch, TableCatalog, ValueKind};
//!
//! // Describe the table
//! let catalog = TableCatalog::from_cols(vec![
//!     ColInfo::scalar("X", ValueKind::Long),
//! ]);
//!
//! // Compile once
//! let expr = parse("X * 2 > 5", &catalog).unwrap();
//!
//! // Bind and evaluate per batch; buffers carry the null sentinel at
//! // index 0 and rows from index 1
//! let x = [0i64, 1, 3, 7];
//! let batch = RowBatch {
//!     first_row: 1,
//!     row_offset: 0,
//!     nrows: 3,
//!     columns: vec![Some(ColumnData::Long(&x))],
//! };
//! let ctx = expr.bind(&batch).unwrap();
//! let result = expr.evaluate(&ctx).unwrap();
//! assert_eq!(result.bools().unwrap(), &[false, true, true]);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - value model, shapes, errors, host interfaces
//! - [`parser`] - lexer and Pratt parser
//! - [`tree`] - compiled node arena and typed builders
//! - [`functions`] - the closed built-in function set
//! - [`engine`] - batch binding and the vectorized evaluator
//! - [`binspec`] - histogram binning specification parser

pub mod binspec;
pub mod core;
pub mod engine;
pub mod functions;
pub mod parser;
pub mod tree;

// Re-export main types for convenience
pub use core::{
    ArrayValue, Buffer, ColInfo, ColumnCatalog, ColumnData, DefaultRandom, EngineConfig, Error,
    MessageSink, NullSink, RandomSource, Result, RowBatch, Scalar, Shape, TableCatalog,
    ValueKind, VecSink, MAX_DIMS,
};

pub use parser::{parse, parse_with_config, ParseError, ParseErrorKind};

pub use tree::CompiledExpr;

pub use engine::{BindCtx, Evaluator};

pub use functions::FuncOp;

pub use binspec::{parse_binspec, BinAxis, BinSpec, BinWeight, MAX_BIN_AXES};
