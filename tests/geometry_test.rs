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

//! Region Predicate and Math Function Tests
//!
//! Tests for NEAR, CIRCLE, BOX, ELLIPSE, and the one-argument math
//! functions with their domain checks.

use rowexpr::{parse, ColInfo, ColumnData, RowBatch, TableCatalog, ValueKind};

fn catalog() -> TableCatalog {
    TableCatalog::from_cols(vec![
        ColInfo::scalar("X", ValueKind::Double),
        ColInfo::scalar("Y", ValueKind::Double),
    ])
}

fn xy_batch<'a>(x: &'a [f64], y: &'a [f64], nrows: usize) -> RowBatch<'a> {
    RowBatch {
        first_row: 1,
        row_offset: 0,
        nrows,
        columns: vec![Some(ColumnData::Double(x)), Some(ColumnData::Double(y))],
    }
}

// ============================================================================
// CIRCLE
// ============================================================================

#[test]
fn test_circle_inclusion() {
    let x = [0.0f64, 0.0, 1.0, 0.5];
    let y = [0.0f64, 0.0, 0.0, 0.5];
    let b = xy_batch(&x, &y, 3);

    let expr = parse("CIRCLE(0.0, 0.0, 1.0, X, Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(
        result.bools().unwrap(),
        &[true, true, true],
        "boundary points count as inside"
    );
}

#[test]
fn test_circle_exclusion() {
    let x = [0.0f64, 2.0];
    let y = [0.0f64, 0.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("CIRCLE(0.0, 0.0, 1.0, X, Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[false]);
}

#[test]
fn test_circle_matches_algebraic_form() {
    let x = [0.0f64, 0.3, -0.9, 1.2, 0.7, -0.1];
    let y = [0.0f64, 0.4, 0.5, -0.1, 0.7, 0.99];
    let b = xy_batch(&x, &y, 5);

    let circle = parse("CIRCLE(0.0, 0.0, 1.0, X, Y)", &catalog()).expect("parse failed");
    let algebra = parse("X*X + Y*Y <= 1.0", &catalog()).expect("parse failed");

    let ctx = circle.bind(&b).expect("bind failed");
    let lhs = circle.evaluate(&ctx).expect("evaluate failed");
    let ctx = algebra.bind(&b).expect("bind failed");
    let rhs = algebra.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(lhs.bools().unwrap(), rhs.bools().unwrap());
}

// ============================================================================
// BOX / ELLIPSE
// ============================================================================

#[test]
fn test_axis_aligned_box() {
    let x = [0.0f64, 0.4, 1.1, -0.4];
    let y = [0.0f64, 0.2, 0.0, -0.24];
    let b = xy_batch(&x, &y, 3);

    // Box centered at origin, width 1, height 0.5, no rotation
    let expr = parse("BOX(0.0, 0.0, 1.0, 0.5, 0.0, X, Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[true, false, true]);
}

#[test]
fn test_rotated_box() {
    // A unit square rotated 45 degrees contains (0.6, 0.0) but an
    // axis-aligned one of the same size does not contain (0.6, 0.6)
    let x = [0.0f64, 0.6];
    let y = [0.0f64, 0.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("BOX(0.0, 0.0, 1.0, 1.0, 45.0, X, Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[true]);
}

#[test]
fn test_ellipse() {
    let x = [0.0f64, 1.9, 0.0, 1.9];
    let y = [0.0f64, 0.0, 0.9, 0.9];
    let b = xy_batch(&x, &y, 3);

    // Semi-axes 2 and 1, no rotation
    let expr = parse("ELLIPSE(0.0, 0.0, 2.0, 1.0, 0.0, X, Y)", &catalog())
        .expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[true, true, false]);
}

#[test]
fn test_geometry_null_argument_nulls_row() {
    let x = [f64::NAN, 0.5, f64::NAN];
    let y = [0.0f64, 0.0, 0.0];
    let b = xy_batch(&x, &y, 2);

    let expr = parse("CIRCLE(0.0, 0.0, 1.0, X, Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![0, 1]);
}

// ============================================================================
// NEAR
// ============================================================================

#[test]
fn test_near() {
    let x = [0.0f64, 1.0, 1.0, 1.0];
    let y = [0.0f64, 1.05, 1.2, 0.95];
    let b = xy_batch(&x, &y, 3);

    let expr = parse("NEAR(X, Y, 0.1)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[true, false, true]);
}

#[test]
fn test_near_tolerance_is_strict() {
    let x = [0.0f64, 1.0];
    let y = [0.0f64, 1.1];
    let b = xy_batch(&x, &y, 1);

    // |1.0 - 1.1| is not strictly less than 0.1 up to rounding; use an
    // exactly representable pair instead
    let expr = parse("NEAR(X, Y, 0.05)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.bools().unwrap(), &[false]);
}

// ============================================================================
// Math functions
// ============================================================================

#[test]
fn test_sqrt_hypotenuse() {
    let x = [0.0f64, 3.0];
    let y = [0.0f64, 4.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("SQRT(X*X + Y*Y)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.doubles().unwrap(), &[5.0]);
}

#[test]
fn test_trig_identity() {
    let x = [0.0f64, 0.3, 1.1, -0.7];
    let y = [0.0f64, 0.0, 0.0, 0.0];
    let b = xy_batch(&x, &y, 3);

    let expr = parse("SIN(X)*SIN(X) + COS(X)*COS(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    for v in result.doubles().unwrap() {
        assert!((v - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_arctan2() {
    let x = [0.0f64, 1.0];
    let y = [0.0f64, 1.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("ARCTAN2(Y, X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert!((result.doubles().unwrap()[0] - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
}

#[test]
fn test_log_and_exp() {
    let x = [0.0f64, 1.0, std::f64::consts::E];
    let y = [0.0f64, 0.0, 0.0];
    let b = xy_batch(&x, &y, 2);

    let expr = parse("LOG(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    let values = result.doubles().unwrap();
    assert_eq!(values[0], 0.0);
    assert!((values[1] - 1.0).abs() < 1e-12);

    let expr = parse("LOG10(100.0)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&xy_batch(&x, &y, 1)).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert!((result.doubles().unwrap()[0] - 2.0).abs() < 1e-12);
}

#[test]
fn test_abs_preserves_kind() {
    let catalog = TableCatalog::from_cols(vec![ColInfo::scalar("N", ValueKind::Long)]);
    let n = [0i64, -5, 5, -7];
    let b = RowBatch {
        first_row: 1,
        row_offset: 0,
        nrows: 3,
        columns: vec![Some(ColumnData::Long(&n))],
    };

    let expr = parse("ABS(N)", &catalog).expect("parse failed");
    assert_eq!(expr.result_kind(), ValueKind::Long);
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.longs().unwrap(), &[5, 5, 7]);
}

// ============================================================================
// Domain errors
// ============================================================================

#[test]
fn test_sqrt_of_negative_fails() {
    let x = [0.0f64, -1.0];
    let y = [0.0f64, 0.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("SQRT(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let err = expr.evaluate(&ctx).unwrap_err();
    assert!(err.is_arithmetic(), "got {:?}", err);
}

#[test]
fn test_log_of_nonpositive_fails() {
    let x = [f64::NAN, 0.0];
    let y = [0.0f64, 0.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("LOG(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    assert!(expr.evaluate(&ctx).is_err());
}

#[test]
fn test_arcsin_domain() {
    let x = [0.0f64, 2.0];
    let y = [0.0f64, 0.0];
    let b = xy_batch(&x, &y, 1);

    let expr = parse("ARCSIN(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    assert!(expr.evaluate(&ctx).is_err());
}

#[test]
fn test_null_passes_through_math() {
    // NaN sentinel: the middle row is null and must not trip the SQRT
    // domain check
    let x = [f64::NAN, 4.0, f64::NAN, 9.0];
    let y = [0.0f64, 0.0, 0.0, 0.0];
    let b = xy_batch(&x, &y, 3);

    let expr = parse("SQRT(X)", &catalog()).expect("parse failed");
    let ctx = expr.bind(&b).expect("bind failed");
    let result = expr.evaluate(&ctx).expect("evaluate failed");
    assert_eq!(result.undef, vec![0, 1, 0]);
    let values = result.doubles().unwrap();
    assert_eq!(values[0], 2.0);
    assert_eq!(values[2], 3.0);
}
