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

//! Batch manager
//!
//! Binding reseats every column leaf onto the live buffers of one batch
//! and reconstructs per-row undef masks from the sentinel convention:
//! the element at index 0 of a column buffer is its null sentinel, and a
//! row element is undefined iff it equals a non-zero (non-empty)
//! sentinel. Packed bit columns are unpacked into per-row `'0'`/`'1'`
//! strings. Numeric and string data is borrowed, never copied.

use crate::core::{ColumnData, Error, Result, RowBatch, Shape, ValueKind};
use crate::tree::{CompiledExpr, NodeKind};

/// One column bound to a batch: borrowed data plus a rebuilt undef mask
#[derive(Debug)]
pub(crate) enum BoundColumn<'a> {
    /// Boolean column; bytes, 0 = false, sentinel value = undefined
    Bool {
        data: &'a [u8],
        undef: Vec<u8>,
        nelem: usize,
    },
    /// Integer column
    Long {
        data: &'a [i64],
        undef: Vec<u8>,
        nelem: usize,
    },
    /// Float column
    Double {
        data: &'a [f64],
        undef: Vec<u8>,
        nelem: usize,
    },
    /// String column; keeps the sentinel for `ISNULL`
    Str {
        data: &'a [String],
        undef: Vec<u8>,
        sentinel: &'a str,
    },
    /// Bit column unpacked into per-row bit strings
    Bits { rows: Vec<String>, nelem: usize },
}

/// Per-batch binding of a compiled expression
///
/// Holds the bound columns, the row window, and nothing else; the
/// compiled tree itself stays immutable.
#[derive(Debug)]
pub struct BindCtx<'a> {
    columns: Vec<Option<BoundColumn<'a>>>,
    first_row: i64,
    row_offset: i64,
    nrows: usize,
}

impl<'a> BindCtx<'a> {
    /// Number of rows in the bound batch
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// 1-based global row number of batch row 0
    pub fn first_row(&self) -> i64 {
        self.first_row
    }

    /// Segment offset added to `#ROW`
    pub fn row_offset(&self) -> i64 {
        self.row_offset
    }

    pub(crate) fn column(&self, idx: usize) -> Result<&BoundColumn<'a>> {
        self.columns
            .get(idx)
            .and_then(|c| c.as_ref())
            .ok_or(Error::ColumnNotBound(idx))
    }
}

impl CompiledExpr {
    /// Bind this expression to a batch of rows
    ///
    /// Rebuilds undef masks and column references; fails if a referenced
    /// column is missing from the batch or its buffer disagrees with the
    /// column's declared kind and element count.
    pub fn bind<'a>(&self, batch: &RowBatch<'a>) -> Result<BindCtx<'a>> {
        let mut columns: Vec<Option<BoundColumn<'a>>> = Vec::new();
        columns.resize_with(batch.columns.len(), || None);

        for idx in self.referenced_columns() {
            let (kind, shape) = self.column_decl(idx)?;
            let data = batch
                .columns
                .get(idx)
                .and_then(|c| c.as_ref())
                .copied()
                .ok_or(Error::ColumnNotBound(idx))?;
            let bound = bind_column(idx, kind, &shape, data, batch.nrows)?;
            columns[idx] = Some(bound);
        }

        Ok(BindCtx {
            columns,
            first_row: batch.first_row,
            row_offset: batch.row_offset,
            nrows: batch.nrows,
        })
    }

    /// Declared kind and shape of a referenced column
    fn column_decl(&self, idx: usize) -> Result<(ValueKind, Shape)> {
        for i in 0..self.len() {
            let node = self.node(i);
            if node.kind == NodeKind::Column(idx) {
                return Ok((node.dtype, node.shape));
            }
        }
        Err(Error::internal(format!(
            "column {} not present in compiled tree",
            idx
        )))
    }
}

/// Bind one column buffer, rebuilding its undef mask
fn bind_column<'a>(
    idx: usize,
    kind: ValueKind,
    shape: &Shape,
    data: ColumnData<'a>,
    nrows: usize,
) -> Result<BoundColumn<'a>> {
    let nelem = shape.nelem;
    match (kind, data) {
        (ValueKind::Bool, ColumnData::Bool(raw)) => {
            let rows = take_rows(idx, raw, nrows, nelem)?;
            let sentinel = raw[0];
            let undef = if sentinel != 0 {
                rows.iter().map(|&v| u8::from(v == sentinel)).collect()
            } else {
                vec![0; rows.len()]
            };
            Ok(BoundColumn::Bool {
                data: rows,
                undef,
                nelem,
            })
        }
        (ValueKind::Long, ColumnData::Long(raw)) => {
            let rows = take_rows(idx, raw, nrows, nelem)?;
            let sentinel = raw[0];
            let undef = if sentinel != 0 {
                rows.iter().map(|&v| u8::from(v == sentinel)).collect()
            } else {
                vec![0; rows.len()]
            };
            Ok(BoundColumn::Long {
                data: rows,
                undef,
                nelem,
            })
        }
        (ValueKind::Double, ColumnData::Double(raw)) => {
            let rows = take_rows(idx, raw, nrows, nelem)?;
            let sentinel = raw[0];
            let undef = if sentinel.is_nan() {
                rows.iter().map(|v| u8::from(v.is_nan())).collect()
            } else if sentinel != 0.0 {
                rows.iter().map(|&v| u8::from(v == sentinel)).collect()
            } else {
                vec![0; rows.len()]
            };
            Ok(BoundColumn::Double {
                data: rows,
                undef,
                nelem,
            })
        }
        (ValueKind::Str, ColumnData::Str(raw)) => {
            let rows = take_rows(idx, raw, nrows, 1)?;
            let sentinel = raw[0].as_str();
            let undef = if !sentinel.is_empty() {
                rows.iter().map(|v| u8::from(v.as_str() == sentinel)).collect()
            } else {
                vec![0; rows.len()]
            };
            Ok(BoundColumn::Str {
                data: rows,
                undef,
                sentinel,
            })
        }
        (ValueKind::Bits, ColumnData::Bits(raw)) => {
            let bytes_per_row = nelem.div_ceil(8);
            let needed = nrows * bytes_per_row;
            if raw.len() < needed {
                return Err(Error::batch_mismatch(
                    idx,
                    format!("need {} packed bytes, got {}", needed, raw.len()),
                ));
            }
            let mut rows = Vec::with_capacity(nrows);
            for r in 0..nrows {
                let row_bytes = &raw[r * bytes_per_row..(r + 1) * bytes_per_row];
                let mut bits = String::with_capacity(nelem);
                for b in 0..nelem {
                    let byte = row_bytes[b / 8];
                    let set = byte & (0x80 >> (b % 8)) != 0;
                    bits.push(if set { '1' } else { '0' });
                }
                rows.push(bits);
            }
            Ok(BoundColumn::Bits { rows, nelem })
        }
        (kind, _) => Err(Error::batch_mismatch(
            idx,
            format!("buffer kind does not match declared {}", kind),
        )),
    }
}

/// Slice the row data out of a sentinel-prefixed buffer
fn take_rows<'a, T>(idx: usize, raw: &'a [T], nrows: usize, nelem: usize) -> Result<&'a [T]> {
    let needed = 1 + nrows * nelem;
    if raw.len() < needed {
        return Err(Error::batch_mismatch(
            idx,
            format!("need {} elements, got {}", needed, raw.len()),
        ));
    }
    Ok(&raw[1..needed])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColInfo, TableCatalog};
    use crate::parser::parse;

    fn bind_one<'a>(
        expr: &CompiledExpr,
        columns: Vec<Option<ColumnData<'a>>>,
        nrows: usize,
    ) -> Result<BindCtx<'a>> {
        expr.bind(&RowBatch {
            first_row: 1,
            row_offset: 0,
            nrows,
            columns,
        })
    }

    #[test]
    fn test_bind_long_with_sentinel() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("X", ValueKind::Long)]);
        let expr = parse("X + 1", &catalog).unwrap();

        // Sentinel -99: second row is null
        let buf = [-99i64, 5, -99, 7];
        let ctx = bind_one(&expr, vec![Some(ColumnData::Long(&buf))], 3).unwrap();
        match ctx.column(0).unwrap() {
            BoundColumn::Long { data, undef, nelem } => {
                assert_eq!(*data, &[5, -99, 7][..]);
                assert_eq!(undef, &vec![0, 1, 0]);
                assert_eq!(*nelem, 1);
            }
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_bind_zero_sentinel_means_no_nulls() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("X", ValueKind::Long)]);
        let expr = parse("X + 1", &catalog).unwrap();

        let buf = [0i64, 0, 0, 7];
        let ctx = bind_one(&expr, vec![Some(ColumnData::Long(&buf))], 3).unwrap();
        match ctx.column(0).unwrap() {
            BoundColumn::Long { undef, .. } => assert_eq!(undef, &vec![0, 0, 0]),
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_bind_nan_sentinel() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("Y", ValueKind::Double)]);
        let expr = parse("Y * 2.0", &catalog).unwrap();

        let buf = [f64::NAN, 1.0, f64::NAN, 3.0];
        let ctx = bind_one(&expr, vec![Some(ColumnData::Double(&buf))], 3).unwrap();
        match ctx.column(0).unwrap() {
            BoundColumn::Double { undef, .. } => assert_eq!(undef, &vec![0, 1, 0]),
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_bind_string_sentinel() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("S", ValueKind::Str)]);
        let expr = parse("S == 'hi'", &catalog).unwrap();

        let buf: Vec<String> = ["??", "hi", "??", "yo"].iter().map(|s| s.to_string()).collect();
        let ctx = bind_one(&expr, vec![Some(ColumnData::Str(&buf))], 3).unwrap();
        match ctx.column(0).unwrap() {
            BoundColumn::Str {
                undef, sentinel, ..
            } => {
                assert_eq!(*sentinel, "??");
                assert_eq!(undef, &vec![0, 1, 0]);
            }
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_bind_bits_unpacks_msb_first() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::vector("M", ValueKind::Bits, 4)]);
        let expr = parse("M == b'1100'", &catalog).unwrap();

        // Each row occupies one byte (4 bits used, MSB first)
        let buf = [0b1100_0000u8, 0b1010_0000];
        let ctx = bind_one(&expr, vec![Some(ColumnData::Bits(&buf))], 2).unwrap();
        match ctx.column(0).unwrap() {
            BoundColumn::Bits { rows, nelem } => {
                assert_eq!(rows, &vec!["1100".to_string(), "1010".to_string()]);
                assert_eq!(*nelem, 4);
            }
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn test_bind_missing_column() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("X", ValueKind::Long)]);
        let expr = parse("X + 1", &catalog).unwrap();
        let err = bind_one(&expr, vec![None], 3).unwrap_err();
        assert_eq!(err, Error::ColumnNotBound(0));
    }

    #[test]
    fn test_bind_short_buffer() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("X", ValueKind::Long)]);
        let expr = parse("X + 1", &catalog).unwrap();
        let buf = [0i64, 1];
        let err = bind_one(&expr, vec![Some(ColumnData::Long(&buf))], 3).unwrap_err();
        assert!(err.is_bind_error());
    }

    #[test]
    fn test_bind_kind_mismatch() {
        let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("X", ValueKind::Long)]);
        let expr = parse("X + 1", &catalog).unwrap();
        let buf = [0.0f64, 1.0, 2.0, 3.0];
        let err = bind_one(&expr, vec![Some(ColumnData::Double(&buf))], 3).unwrap_err();
        assert!(err.is_bind_error());
    }

    #[test]
    fn test_bind_skips_unreferenced_columns() {
        let catalog = TableCatalog::from_cols(vec![
            ColInfo::scalar("X", ValueKind::Long),
            ColInfo::scalar("Y", ValueKind::Double),
        ]);
        let expr = parse("X + 1", &catalog).unwrap();
        let buf = [0i64, 1, 2, 3];
        // Y has no buffer, which is fine since the expression ignores it
        let ctx = bind_one(&expr, vec![Some(ColumnData::Long(&buf)), None], 3).unwrap();
        assert!(ctx.column(0).is_ok());
        assert!(ctx.column(1).is_err());
    }
}
