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

//! Null Propagation Tests
//!
//! Tests for undef masks: sentinel reconstruction, elementwise
//! propagation, OR dominance, ISNULL, DEFNULL, and sticky errors.

use rowexpr::{
    parse, ColInfo, ColumnData, Error, Evaluator, RowBatch, TableCatalog, ValueKind, VecSink,
};

fn catalog() -> TableCatalog {
    TableCatalog::from_cols(vec![
        ColInfo::scalar("X", ValueKind::Long),
        ColInfo::scalar("B", ValueKind::Bool),
        ColInfo::scalar("S", ValueKind::Str),
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
// Propagation through arithmetic
// ============================================================================

#[test]
fn test_null_propagates_through_arithmetic() {
    // Sentinel -99: the middle row is null
    let x = [-99i64, 5, -99, 7];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("X + 1", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![0, 1, 0]);
    let values = result.longs().unwrap();
    assert_eq!(values[0], 6);
    assert_eq!(values[2], 8);
}

#[test]
fn test_null_monotonicity_binary_ops() {
    let x = [-99i64, -99, 2, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    for input in ["X + X", "X - 1", "X * 2", "X % 2", "X ** 2", "X & 3", "X | 4"] {
        let expr = parse(input, &catalog()).expect("parse failed");
        let ctx = expr.bind(&b).expect("bind failed");
        let result = expr.evaluate(&ctx).expect("evaluate failed");
        assert_eq!(result.undef, vec![1, 0, 0], "undef mask for {}", input);
    }
}

#[test]
fn test_comparison_propagates_null() {
    let x = [-99i64, -99, 2, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("X > 1", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![1, 0, 0]);
    assert_eq!(result.bools().unwrap()[1], true);
}

// ============================================================================
// Boolean connectives
// ============================================================================

#[test]
fn test_or_true_dominates_null() {
    // B uses sentinel 2; rows: [null, true, false]
    let bcol = [2u8, 2, 1, 0];
    let b = batch(vec![None, Some(ColumnData::Bool(&bcol)), None], 3);

    let expr = parse("B || T", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(
        result.undef,
        vec![0, 0, 0],
        "defined-true right side dominates"
    );
    assert_eq!(result.bools().unwrap(), &[true, true, true]);
}

#[test]
fn test_or_with_false_side_keeps_null() {
    let bcol = [2u8, 2, 1, 0];
    let b = batch(vec![None, Some(ColumnData::Bool(&bcol)), None], 3);

    let expr = parse("B || F", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![1, 0, 0]);
    assert_eq!(result.bools().unwrap()[1], true);
    assert_eq!(result.bools().unwrap()[2], false);
}

#[test]
fn test_and_propagates_null() {
    let bcol = [2u8, 2, 1, 0];
    let b = batch(vec![None, Some(ColumnData::Bool(&bcol)), None], 3);

    let expr = parse("B && T", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![1, 0, 0]);
}

// ============================================================================
// ISNULL / DEFNULL
// ============================================================================

#[test]
fn test_isnull_always_defined() {
    let x = [-99i64, 5, -99, 7];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("ISNULL(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert!(result.all_defined(), "ISNULL output is never null");
    assert_eq!(result.bools().unwrap(), &[false, true, false]);
}

#[test]
fn test_isnull_on_strings_uses_sentinel() {
    // Sentinel is the empty string; empty rows read as null
    let scol: Vec<String> = ["", "", "hi", ""].iter().map(|s| s.to_string()).collect();
    let b = batch(vec![None, None, Some(ColumnData::Str(&scol))], 3);

    let expr = parse("ISNULL(S)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert!(result.all_defined());
    assert_eq!(result.bools().unwrap(), &[true, false, true]);
}

#[test]
fn test_defnull_replaces_nulls() {
    let x = [-99i64, 5, -99, 7];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("DEFNULL(X, -1)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert!(result.all_defined());
    assert_eq!(result.longs().unwrap(), &[5, -1, 7]);
}

#[test]
fn test_defnull_null_fallback_stays_null() {
    let x = [-99i64, 5, -99, 7];
    let b = batch(
        vec![Some(ColumnData::Long(&x)), None, None],
        3,
    );

    // Both sides null only where X is null and the fallback is X too
    let expr = parse("DEFNULL(X, X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![0, 1, 0]);
}

#[test]
fn test_defnull_on_strings() {
    let scol: Vec<String> = ["??", "??", "hi", "yo"].iter().map(|s| s.to_string()).collect();
    let b = batch(vec![None, None, Some(ColumnData::Str(&scol))], 3);

    let expr = parse("DEFNULL(S, 'none')", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(
        result.strings().unwrap(),
        &["none".to_string(), "hi".to_string(), "yo".to_string()]
    );
}

// ============================================================================
// Sticky errors and diagnostics
// ============================================================================

#[test]
fn test_errors_are_sticky_per_evaluator() {
    let x = [0i64, 1, 0, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("10 / X", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let mut evaluator = Evaluator::new(&expr, &ctx);
    let first = evaluator.evaluate().unwrap_err();
    assert_eq!(first, Error::DivisionByZero);

    // Second call short-circuits with the same error
    let second = evaluator.evaluate().unwrap_err();
    assert_eq!(second, Error::DivisionByZero);
}

#[test]
fn test_error_message_reaches_sink() {
    let x = [0i64, 1, 0, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("10 / X", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let mut sink = VecSink::new();
    {
        let mut evaluator = Evaluator::new(&expr, &ctx).with_sink(&mut sink);
        assert!(evaluator.evaluate().is_err());
    }
    assert_eq!(sink.messages.len(), 1);
    assert!(
        sink.messages[0].contains("division by zero"),
        "message was {}",
        sink.messages[0]
    );
}

#[test]
fn test_fresh_evaluator_recovers() {
    let x = [0i64, 1, 2, 3];
    let b = batch(vec![Some(ColumnData::Long(&x)), None, None], 3);

    let expr = parse("10 / X", &catalog()).expect("parse failed");

    // A failing batch poisons only its own evaluator
    let bad = [0i64, 1, 0, 3];
    let bad_batch = batch(vec![Some(ColumnData::Long(&bad)), None, None], 3);
    let bad_ctx = expr.bind(&bad_batch).expect("bind failed");
    assert!(expr.evaluate(&bad_ctx).is_err());

    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[10, 5, 3]);
}
