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

//! Arithmetic Evaluation Tests
//!
//! Tests for the numeric kernels: arithmetic, comparison, broadcasting,
//! casts, and arithmetic faults.

use rowexpr::{
    parse, ColInfo, ColumnData, Error, RowBatch, TableCatalog, ValueKind,
};

fn catalog() -> TableCatalog {
    TableCatalog::from_cols(vec![
        ColInfo::scalar("X", ValueKind::Long),
        ColInfo::scalar("Y", ValueKind::Double),
    ])
}

fn batch<'a>(columns: Vec<Option<ColumnData<'a>>>, nrows: usize) -> RowBatch<'a> {
    RowBatch {
        first_row: 1,
        row_offset: 0,
        nrows,
        columns,
    }
}

// ============================================================================
// Long arithmetic
// ============================================================================

#[test]
fn test_long_arithmetic() {
    let x = [0i64, 1, 2, 3, 4];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 4);

    let expr = parse("X * 2 + 1", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[3, 5, 7, 9]);
    assert!(result.all_defined());
}

#[test]
fn test_long_division_truncates() {
    let x = [0i64, 7, 8, 9];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("X / 2", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[3, 4, 4]);
}

#[test]
fn test_long_power_stays_long() {
    let x = [0i64, 2, 3, 4];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("X ** 2", &catalog()).expect("parse failed");
    assert_eq!(expr.result_kind(), ValueKind::Long);
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[4, 9, 16]);
}

#[test]
fn test_division_by_zero_fails() {
    let x = [0i64, 1, 0, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("10 / X", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let err = expr.evaluate(&ctx).unwrap_err();
    assert_eq!(err, Error::DivisionByZero);
}

// ============================================================================
// Double arithmetic
// ============================================================================

#[test]
fn test_double_arithmetic() {
    let y = [0.0f64, 1.5, 2.5, -3.0];
    let b = batch(vec![None, Some(ColumnData::Double(&y))], 3);

    let expr = parse("Y * 2.0 - 1.0", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.doubles().unwrap(), &[2.0, 4.0, -7.0]);
}

#[test]
fn test_double_modulus_truncation_definition() {
    // a % b on doubles is a - b * trunc(a / b)
    let y = [0.0f64, 7.5, -7.5];
    let b = batch(vec![None, Some(ColumnData::Double(&y))], 2);

    let expr = parse("Y % 2.0", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    let values = result.doubles().unwrap();
    assert!((values[0] - 1.5).abs() < 1e-12);
    assert!((values[1] + 1.5).abs() < 1e-12, "sign follows the dividend");
}

#[test]
fn test_promotion_long_plus_double() {
    let x = [0i64, 1, 2, 3];
    let y = [0.0f64, 0.5, 0.5, 0.5];
    let b = batch(
        vec![Some(ColumnData::Long(&x)), Some(ColumnData::Double(&y))],
        3,
    );

    let expr = parse("X + Y", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.doubles().unwrap(), &[1.5, 2.5, 3.5]);
}

// ============================================================================
// Broadcasting
// ============================================================================

#[test]
fn test_scalar_broadcasts_against_rows() {
    let x = [0i64, 10, 20, 30];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("100 - X", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[90, 80, 70]);
}

#[test]
fn test_constant_root_fills_every_row() {
    let x = [0i64, 1, 2, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    // Expression folds to the constant 11; the result still covers rows
    let expr = parse("3 + 4 * 2", &catalog()).expect("parse failed");
    let ctx = expr.bind(&batch(vec![None, None], 1)).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[11]);

    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[11, 11, 11]);
}

// ============================================================================
// Comparisons and logic
// ============================================================================

#[test]
fn test_comparison_chain() {
    let x = [0i64, 1, 2, 3, 4];
    let y = [0.0f64, 10.0, 4.0, 3.0, 0.0];
    let b = batch(
        vec![Some(ColumnData::Long(&x)), Some(ColumnData::Double(&y))],
        4,
    );

    let expr = parse("X > 2 && Y < 5", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[false, false, true, true]);
}

#[test]
fn test_range_expression_evaluates() {
    let x = [0i64, 1, 2, 5, 6];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 4);

    let expr = parse("X = 2 : 5", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[false, true, true, false]);
}

#[test]
fn test_bitwise_on_longs() {
    let x = [0i64, 0b1100, 0b1010, 0b1111];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("X & 10", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[0b1000, 0b1010, 0b1010]);

    let expr = parse("X | 1", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[0b1101, 0b1011, 0b1111]);
}

// ============================================================================
// Casts
// ============================================================================

#[test]
fn test_int_cast_truncates_toward_zero() {
    let y = [0.0f64, 2.9, -2.9, 0.4];
    let b = batch(vec![None, Some(ColumnData::Double(&y))], 3);

    let expr = parse("(int) Y", &catalog()).expect("parse failed");
    assert_eq!(expr.result_kind(), ValueKind::Long);
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[2, -2, 0]);
}

#[test]
fn test_float_cast_widens() {
    let x = [0i64, 3, -4, 5];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 3);

    let expr = parse("(float) X / 2.0", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.doubles().unwrap(), &[1.5, -2.0, 2.5]);
}

// ============================================================================
// Result invariants
// ============================================================================

#[test]
fn test_result_length_matches_rows() {
    let x = [0i64, 1, 2, 3, 4, 5];
    for nrows in 1..=5 {
        let b = batch(vec![Some(ColumnData::Long(&x)), None], nrows);
        let expr = parse("X + 1", &catalog()).expect("parse failed");
        let ctx = expr.bind(&b).expect("bind failed");
        let result = expr.evaluate(&ctx).expect("evaluate failed");
        assert_eq!(result.longs().unwrap().len(), nrows);
        assert_eq!(result.undef.len(), nrows);
    }
}

#[test]
fn test_evaluation_is_idempotent() {
    let x = [0i64, 3, 1, 4, 1, 5];
    let b = batch(vec![Some(ColumnData::Long(&x)), None], 5);

    let expr = parse("X * X - 2", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let first = expr.evaluate(&ctx).expect("evaluate failed");
    let second = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(first, second, "same batch must yield identical results");
}

#[test]
fn test_result_kind_is_batch_independent() {
    let expr = parse("X + Y", &catalog()).expect("parse failed");
    let kind = expr.result_kind();

    for nrows in [1usize, 3] {
        let x = [0i64, 1, 2, 3];
        let y = [0.0f64, 1.0, 2.0, 3.0];
        let b = batch(
            vec![Some(ColumnData::Long(&x)), Some(ColumnData::Double(&y))],
            nrows,
        );
        let ctx = expr.bind(&b).expect("bind failed");
        let result = expr.evaluate(&ctx).expect("evaluate failed");
        assert_eq!(result.kind(), kind);
    }
}
