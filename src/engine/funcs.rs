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

//! Built-in function kernels
//!
//! Implemented as an `impl` block on [`Evaluator`]; dispatch arrives from
//! the tree walker. Math domain faults raise a [`Error::DomainError`]
//! and poison the evaluator; null inputs pass through as null outputs
//! except where a function is defined on nulls (`ISNULL`, `DEFNULL`).

use crate::core::{ArrayValue, Buffer, Error, Result, ValueKind};
use crate::functions::FuncOp;
use crate::tree::{Node, NodeId};

use super::bind::BoundColumn;
use super::evaluate::{BoolView, DoubleView, Evaluator, LongView, Operand, StrView};

impl<'e> Evaluator<'e> {
    pub(crate) fn eval_func(
        &mut self,
        op: FuncOp,
        args: &[NodeId],
        node: &Node,
    ) -> Result<Operand<'e>> {
        match op {
            FuncOp::Random => self.eval_random(),
            FuncOp::Sum => self.eval_sum(args[0]),
            FuncOp::Abs => self.eval_abs(args[0], node),
            FuncOp::ArcTan2 => self.eval_arctan2(args[0], args[1], node),
            FuncOp::IsNull => self.eval_is_null(args[0], node),
            FuncOp::DefNull => self.eval_def_null(args[0], args[1], node),
            FuncOp::Nelem => Err(Error::internal("NELEM survived constant folding")),
            _ if op.is_unary_math() => self.eval_unary_math(op, args[0], node),
            _ if op.is_geometry() => self.eval_geometry(op, args),
            other => Err(Error::internal(format!("no kernel for {}", other))),
        }
    }

    fn eval_random(&mut self) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let data: Vec<f64> = (0..nrows).map(|_| self.next_random()).collect();
        let undef = vec![0; nrows];
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Double(data),
            undef,
            nelem: 1,
        }))
    }

    /// Per-row sum over a vector's elements, OR-accumulating undefs
    fn eval_sum(&mut self, arg: NodeId) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let in_nelem = self.expr.node(arg).shape.nelem;
        let kind = self.expr.node(arg).dtype;
        let value = self.eval_node(arg)?;

        match kind {
            ValueKind::Long => {
                let view = LongView::of(&value)?;
                let mut data = Vec::with_capacity(nrows);
                let mut undef = vec![0u8; nrows];
                for r in 0..nrows {
                    let mut acc = 0i64;
                    for e in 0..in_nelem {
                        if view.is_undef(r, e) {
                            undef[r] = 1;
                        }
                        acc = acc.wrapping_add(view.get(r, e));
                    }
                    data.push(acc);
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem: 1,
                }))
            }
            ValueKind::Double => {
                let view = DoubleView::of(&value)?;
                let mut data = Vec::with_capacity(nrows);
                let mut undef = vec![0u8; nrows];
                for r in 0..nrows {
                    let mut acc = 0.0f64;
                    for e in 0..in_nelem {
                        if view.is_undef(r, e) {
                            undef[r] = 1;
                        }
                        acc += view.get(r, e);
                    }
                    data.push(acc);
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Double(data),
                    undef,
                    nelem: 1,
                }))
            }
            ValueKind::Bool => {
                let view = BoolView::of(&value)?;
                let mut data = Vec::with_capacity(nrows);
                let mut undef = vec![0u8; nrows];
                for r in 0..nrows {
                    let mut acc = 0i64;
                    for e in 0..in_nelem {
                        if view.is_undef(r, e) {
                            undef[r] = 1;
                        }
                        acc += i64::from(view.get(r, e));
                    }
                    data.push(acc);
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem: 1,
                }))
            }
            ValueKind::Bits => {
                let view = super::evaluate::BitsView::of(&value)?;
                let data: Vec<i64> = (0..nrows)
                    .map(|r| view.get(r).chars().filter(|&c| c == '1').count() as i64)
                    .collect();
                let undef = vec![0; nrows];
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem: 1,
                }))
            }
            other => Err(Error::type_error(format!("SUM of {}", other))),
        }
    }

    fn eval_abs(&mut self, arg: NodeId, node: &Node) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let value = self.eval_node(arg)?;
        match value.kind() {
            ValueKind::Long => {
                let view = LongView::of(&value)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if view.is_undef(r, e) {
                            undef[i] = 1;
                            data.push(0);
                        } else {
                            data.push(view.get(r, e).wrapping_abs());
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem,
                }))
            }
            _ => {
                let view = DoubleView::of(&value)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if view.is_undef(r, e) {
                            undef[i] = 1;
                            data.push(0.0);
                        } else {
                            data.push(view.get(r, e).abs());
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Double(data),
                    undef,
                    nelem,
                }))
            }
        }
    }

    /// One-argument math with domain checks
    fn eval_unary_math(
        &mut self,
        op: FuncOp,
        arg: NodeId,
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let value = self.eval_node(arg)?;
        let view = DoubleView::of(&value)?;

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        let mut undef = vec![0u8; total];
        for r in 0..nrows {
            for e in 0..nelem {
                let i = r * nelem + e;
                if view.is_undef(r, e) {
                    undef[i] = 1;
                    data.push(0.0);
                    continue;
                }
                let x = view.get(r, e);
                let v = match op {
                    FuncOp::Sin => x.sin(),
                    FuncOp::Cos => x.cos(),
                    FuncOp::Tan => x.tan(),
                    FuncOp::ArcSin => {
                        if !(-1.0..=1.0).contains(&x) {
                            return Err(Error::domain("ARCSIN", "argument outside [-1, 1]"));
                        }
                        x.asin()
                    }
                    FuncOp::ArcCos => {
                        if !(-1.0..=1.0).contains(&x) {
                            return Err(Error::domain("ARCCOS", "argument outside [-1, 1]"));
                        }
                        x.acos()
                    }
                    FuncOp::ArcTan => x.atan(),
                    FuncOp::Exp => x.exp(),
                    FuncOp::Log => {
                        if x <= 0.0 {
                            return Err(Error::domain("LOG", "nonpositive argument"));
                        }
                        x.ln()
                    }
                    FuncOp::Log10 => {
                        if x <= 0.0 {
                            return Err(Error::domain("LOG10", "nonpositive argument"));
                        }
                        x.log10()
                    }
                    FuncOp::Sqrt => {
                        if x < 0.0 {
                            return Err(Error::domain("SQRT", "negative argument"));
                        }
                        x.sqrt()
                    }
                    other => {
                        return Err(Error::internal(format!(
                            "{} is not a unary math function",
                            other
                        )));
                    }
                };
                data.push(v);
            }
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Double(data),
            undef,
            nelem,
        }))
    }

    fn eval_arctan2(&mut self, a: NodeId, b: NodeId, node: &Node) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let va = self.eval_node(a)?;
        let vb = self.eval_node(b)?;
        let ya = DoubleView::of(&va)?;
        let xb = DoubleView::of(&vb)?;

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        let mut undef = vec![0u8; total];
        for r in 0..nrows {
            for e in 0..nelem {
                let i = r * nelem + e;
                if ya.is_undef(r, e) || xb.is_undef(r, e) {
                    undef[i] = 1;
                    data.push(0.0);
                } else {
                    data.push(ya.get(r, e).atan2(xb.get(r, e)));
                }
            }
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Double(data),
            undef,
            nelem,
        }))
    }

    /// `ISNULL` always yields a defined boolean
    ///
    /// For strings the test compares each row against the column's null
    /// sentinel; computed strings test against the empty string.
    fn eval_is_null(&mut self, arg: NodeId, node: &Node) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let value = self.eval_node(arg)?;

        if value.kind() == ValueKind::Str {
            let data: Vec<bool> = match &value {
                Operand::Column(BoundColumn::Str { data, sentinel, .. }) => {
                    data.iter().map(|row| row.as_str() == *sentinel).collect()
                }
                _ => {
                    let view = StrView::of(&value)?;
                    (0..nrows)
                        .map(|r| view.is_undef(r) || view.get(r).is_empty())
                        .collect()
                }
            };
            let undef = vec![0; data.len()];
            return Ok(Operand::Array(ArrayValue {
                buf: Buffer::Bool(data),
                undef,
                nelem: 1,
            }));
        }

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        match value.kind() {
            ValueKind::Bool => {
                let view = BoolView::of(&value)?;
                for r in 0..nrows {
                    for e in 0..nelem {
                        data.push(view.is_undef(r, e));
                    }
                }
            }
            ValueKind::Long => {
                let view = LongView::of(&value)?;
                for r in 0..nrows {
                    for e in 0..nelem {
                        data.push(view.is_undef(r, e));
                    }
                }
            }
            ValueKind::Double => {
                let view = DoubleView::of(&value)?;
                for r in 0..nrows {
                    for e in 0..nelem {
                        data.push(view.is_undef(r, e));
                    }
                }
            }
            other => return Err(Error::type_error(format!("ISNULL of {}", other))),
        }
        let undef = vec![0; total];
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Bool(data),
            undef,
            nelem,
        }))
    }

    /// `DEFNULL(a, b)`: `a` where defined, else `b`
    fn eval_def_null(&mut self, a: NodeId, b: NodeId, node: &Node) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let va = self.eval_node(a)?;
        let vb = self.eval_node(b)?;

        match node.dtype {
            ValueKind::Long => {
                let pa = LongView::of(&va)?;
                let pb = LongView::of(&vb)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if !pa.is_undef(r, e) {
                            data.push(pa.get(r, e));
                        } else if !pb.is_undef(r, e) {
                            data.push(pb.get(r, e));
                        } else {
                            undef[i] = 1;
                            data.push(0);
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem,
                }))
            }
            ValueKind::Double => {
                let pa = DoubleView::of(&va)?;
                let pb = DoubleView::of(&vb)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if !pa.is_undef(r, e) {
                            data.push(pa.get(r, e));
                        } else if !pb.is_undef(r, e) {
                            data.push(pb.get(r, e));
                        } else {
                            undef[i] = 1;
                            data.push(0.0);
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Double(data),
                    undef,
                    nelem,
                }))
            }
            ValueKind::Bool => {
                let pa = BoolView::of(&va)?;
                let pb = BoolView::of(&vb)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if !pa.is_undef(r, e) {
                            data.push(pa.get(r, e));
                        } else if !pb.is_undef(r, e) {
                            data.push(pb.get(r, e));
                        } else {
                            undef[i] = 1;
                            data.push(false);
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bool(data),
                    undef,
                    nelem,
                }))
            }
            ValueKind::Str => {
                let pa = StrView::of(&va)?;
                let pb = StrView::of(&vb)?;
                let mut data = Vec::with_capacity(nrows);
                let mut undef = vec![0u8; nrows];
                for r in 0..nrows {
                    if !pa.is_undef(r) {
                        data.push(pa.get(r).to_string());
                    } else if !pb.is_undef(r) {
                        data.push(pb.get(r).to_string());
                    } else {
                        undef[r] = 1;
                        data.push(String::new());
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Str(data),
                    undef,
                    nelem: 1,
                }))
            }
            other => Err(Error::type_error(format!("DEFNULL of {}", other))),
        }
    }

    /// 2-D region predicates and `NEAR`
    ///
    /// Arguments are per-row scalars, promoted to Double at parse time;
    /// a null in any argument makes that row's result null.
    fn eval_geometry(&mut self, op: FuncOp, args: &[NodeId]) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push(self.eval_node(arg)?);
        }
        let views: Vec<DoubleView<'_>> = values
            .iter()
            .map(DoubleView::of)
            .collect::<Result<_>>()?;

        let mut data = Vec::with_capacity(nrows);
        let mut undef = vec![0u8; nrows];
        for r in 0..nrows {
            if views.iter().any(|v| v.is_undef(r, 0)) {
                undef[r] = 1;
                data.push(false);
                continue;
            }
            let arg = |k: usize| views[k].get(r, 0);
            let inside = match op {
                FuncOp::Near => {
                    let (x, y, tol) = (arg(0), arg(1), arg(2));
                    (x - y).abs() < tol
                }
                FuncOp::Circle => {
                    let (xc, yc, radius, x, y) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                    let (dx, dy) = (x - xc, y - yc);
                    dx * dx + dy * dy <= radius * radius
                }
                FuncOp::Box => {
                    let (xc, yc, w, h, rot) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                    let (x, y) = (arg(5), arg(6));
                    let (dx, dy) = rotate(x - xc, y - yc, rot);
                    dx.abs() <= w / 2.0 && dy.abs() <= h / 2.0
                }
                FuncOp::Ellipse => {
                    let (xc, yc, sa, sb, rot) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                    let (x, y) = (arg(5), arg(6));
                    let (dx, dy) = rotate(x - xc, y - yc, rot);
                    (dx / sa) * (dx / sa) + (dy / sb) * (dy / sb) <= 1.0
                }
                other => {
                    return Err(Error::internal(format!(
                        "{} is not a geometry function",
                        other
                    )));
                }
            };
            data.push(inside);
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Bool(data),
            undef,
            nelem: 1,
        }))
    }
}

/// Rotate `(dx, dy)` by `-rot` degrees
fn rotate(dx: f64, dy: f64, rot_deg: f64) -> (f64, f64) {
    let rad = rot_deg.to_radians();
    let (s, c) = rad.sin_cos();
    (c * dx + s * dy, -s * dx + c * dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_quarter_turn() {
        // A point on +x rotated by -90 degrees lands on -y
        let (dx, dy) = rotate(1.0, 0.0, 90.0);
        assert!(dx.abs() < 1e-12);
        assert!((dy + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_identity() {
        let (dx, dy) = rotate(0.25, -0.5, 0.0);
        assert_eq!(dx, 0.25);
        assert_eq!(dy, -0.5);
    }
}
