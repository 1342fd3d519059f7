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

//! Host-supplied interfaces
//!
//! The engine consumes its surroundings through four narrow seams:
//!
//! - [`ColumnCatalog`] - column name/index to metadata resolution
//! - [`RowBatch`] / [`ColumnData`] - live column buffers for one batch
//! - [`MessageSink`] - one-line diagnostics
//! - [`RandomSource`] - uniform doubles for `RANDOM()`
//!
//! [`TableCatalog`] is a ready-made catalog for hosts that already hold
//! their column metadata in memory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::ColInfo;

/// Engine tunables
///
/// Constructed via `Default`; the parser and binder read the limits from
/// the copy retained by the compiled expression.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest accepted string literal and string column width
    pub max_string_len: usize,
    /// Longest accepted bit-string literal or operand
    pub max_bits_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_string_len: 255,
            max_bits_len: 255,
        }
    }
}

/// Column metadata lookup
///
/// The parser resolves bare identifiers and `#N` references through this
/// trait; the returned index is the position used later by
/// [`RowBatch::columns`].
pub trait ColumnCatalog {
    /// Resolve a column name (case-insensitive) to its index
    fn lookup(&self, name: &str) -> Option<usize>;

    /// Metadata for the column at `idx`
    fn col_info(&self, idx: usize) -> Option<&ColInfo>;

    /// Number of columns in the table
    fn ncols(&self) -> usize;
}

/// In-memory [`ColumnCatalog`] over a column list
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    cols: Vec<ColInfo>,
}

impl TableCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column and return its index
    pub fn push(&mut self, col: ColInfo) -> usize {
        self.cols.push(col);
        self.cols.len() - 1
    }

    /// Build a catalog from a column list
    pub fn from_cols(cols: Vec<ColInfo>) -> Self {
        Self { cols }
    }
}

impl ColumnCatalog for TableCatalog {
    fn lookup(&self, name: &str) -> Option<usize> {
        self.cols
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn col_info(&self, idx: usize) -> Option<&ColInfo> {
        self.cols.get(idx)
    }

    fn ncols(&self) -> usize {
        self.cols.len()
    }
}

/// One column's live buffer for a batch
///
/// Numeric, boolean and string buffers follow the sentinel convention:
/// the element at index 0 is the column's null sentinel and rows start at
/// index 1, so a buffer must hold `1 + nrows * nelem` elements (strings:
/// `1 + nrows`). A row element is undefined iff it equals the sentinel
/// and the sentinel itself is non-zero (non-empty for strings). A NaN
/// float sentinel marks NaN elements undefined.
///
/// Bit columns carry no sentinel: the buffer is the packed bit stream,
/// each row occupying `ceil(nelem / 8)` bytes, most significant bit
/// first.
#[derive(Debug, Clone, Copy)]
pub enum ColumnData<'a> {
    /// Boolean column; stored as bytes so a non-0/1 sentinel can mark nulls
    Bool(&'a [u8]),
    /// 64-bit integer column
    Long(&'a [i64]),
    /// 64-bit float column
    Double(&'a [f64]),
    /// String column, one entry per row after the sentinel
    Str(&'a [String]),
    /// Packed bit column
    Bits(&'a [u8]),
}

/// A contiguous range of rows presented to the evaluator at once
///
/// `columns` is indexed by catalog column index; entries for columns the
/// expression never references may be `None`. The global (1-based) row
/// number of batch row `i` is `first_row + row_offset + i`.
pub struct RowBatch<'a> {
    /// 1-based global row number of the batch's first row
    pub first_row: i64,
    /// Extra offset applied by hosts that feed a table in segments
    pub row_offset: i64,
    /// Number of rows in this batch
    pub nrows: usize,
    /// Live column buffers, indexed like the catalog
    pub columns: Vec<Option<ColumnData<'a>>>,
}

/// One-line diagnostics sink
pub trait MessageSink {
    /// Record a single diagnostic line
    fn push(&mut self, msg: &str);
}

/// Sink that discards all messages
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn push(&mut self, _msg: &str) {}
}

/// Sink that collects messages for later inspection
#[derive(Debug, Default)]
pub struct VecSink {
    /// Collected diagnostic lines, oldest first
    pub messages: Vec<String>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageSink for VecSink {
    fn push(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }
}

/// Uniform random doubles in `[0, 1)` for `RANDOM()`
pub trait RandomSource {
    /// Next uniform double in `[0, 1)`
    fn next_double(&mut self) -> f64;
}

/// Default [`RandomSource`] backed by a seedable PRNG
#[derive(Debug)]
pub struct DefaultRandom {
    rng: StdRng,
}

impl DefaultRandom {
    /// Create a generator seeded from system entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a deterministically seeded generator
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for DefaultRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for DefaultRandom {
    fn next_double(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}
