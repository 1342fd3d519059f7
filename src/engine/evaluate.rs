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

//! Vectorized evaluator
//!
//! A single recursive walker over the compiled tree, post-order and
//! depth-first. Kernels are selected by the kind of the first operand;
//! parse-time promotion guarantees numeric operands share a kind. A
//! scalar operand broadcasts against a vector one; otherwise both sides
//! iterate lock-step over `nrows * nelem` elements.
//!
//! Interior results are owned [`ArrayValue`] buffers handed to exactly
//! one consumer, so Rust's move semantics implement the single-use
//! buffer discipline directly. The one exception is a node with more
//! than one parent (the range desugaring shares its subject subtree):
//! such a node is evaluated once per pass and its buffer cached, so a
//! non-deterministic subtree like `RANDOM()` yields the same values to
//! every consumer. Errors are sticky per evaluator.

use crate::core::{
    ArrayValue, Buffer, DefaultRandom, Error, MessageSink, RandomSource, Result, Scalar,
    ValueKind,
};
use crate::tree::{BinaryOp, CompiledExpr, Node, NodeId, NodeKind, UnaryOp};

use super::bind::{BindCtx, BoundColumn};
use super::bits;

/// An evaluated operand: constant, computed buffer, or bound column
#[derive(Debug)]
pub(crate) enum Operand<'e> {
    Const(Scalar),
    Array(ArrayValue),
    Column(&'e BoundColumn<'e>),
}

impl Operand<'_> {
    pub(crate) fn kind(&self) -> ValueKind {
        match self {
            Operand::Const(s) => s.kind(),
            Operand::Array(a) => a.kind(),
            Operand::Column(c) => match c {
                BoundColumn::Bool { .. } => ValueKind::Bool,
                BoundColumn::Long { .. } => ValueKind::Long,
                BoundColumn::Double { .. } => ValueKind::Double,
                BoundColumn::Str { .. } => ValueKind::Str,
                BoundColumn::Bits { .. } => ValueKind::Bits,
            },
        }
    }
}

// =============================================================================
// Broadcast-aware operand views
// =============================================================================

/// View over a Long operand
pub(crate) enum LongView<'v> {
    Const(i64),
    Slice {
        data: &'v [i64],
        undef: &'v [u8],
        nelem: usize,
    },
}

impl<'v> LongView<'v> {
    pub(crate) fn of(op: &'v Operand<'v>) -> Result<Self> {
        match op {
            Operand::Const(Scalar::Long(v)) => Ok(LongView::Const(*v)),
            Operand::Array(a) => match &a.buf {
                Buffer::Long(data) => Ok(LongView::Slice {
                    data,
                    undef: &a.undef,
                    nelem: a.nelem,
                }),
                _ => Err(Error::type_error("expected a LONG operand")),
            },
            Operand::Column(BoundColumn::Long { data, undef, nelem }) => Ok(LongView::Slice {
                data,
                undef,
                nelem: *nelem,
            }),
            _ => Err(Error::type_error("expected a LONG operand")),
        }
    }

    #[inline]
    pub(crate) fn get(&self, r: usize, e: usize) -> i64 {
        match self {
            LongView::Const(v) => *v,
            LongView::Slice { data, nelem, .. } => {
                if *nelem == 1 {
                    data[r]
                } else {
                    data[r * nelem + e]
                }
            }
        }
    }

    #[inline]
    pub(crate) fn is_undef(&self, r: usize, e: usize) -> bool {
        match self {
            LongView::Const(_) => false,
            LongView::Slice { undef, nelem, .. } => {
                if *nelem == 1 {
                    undef[r] != 0
                } else {
                    undef[r * nelem + e] != 0
                }
            }
        }
    }
}

/// View over a Double operand
pub(crate) enum DoubleView<'v> {
    Const(f64),
    Slice {
        data: &'v [f64],
        undef: &'v [u8],
        nelem: usize,
    },
}

impl<'v> DoubleView<'v> {
    pub(crate) fn of(op: &'v Operand<'v>) -> Result<Self> {
        match op {
            Operand::Const(Scalar::Double(v)) => Ok(DoubleView::Const(*v)),
            Operand::Array(a) => match &a.buf {
                Buffer::Double(data) => Ok(DoubleView::Slice {
                    data,
                    undef: &a.undef,
                    nelem: a.nelem,
                }),
                _ => Err(Error::type_error("expected a DOUBLE operand")),
            },
            Operand::Column(BoundColumn::Double { data, undef, nelem }) => {
                Ok(DoubleView::Slice {
                    data,
                    undef,
                    nelem: *nelem,
                })
            }
            _ => Err(Error::type_error("expected a DOUBLE operand")),
        }
    }

    #[inline]
    pub(crate) fn get(&self, r: usize, e: usize) -> f64 {
        match self {
            DoubleView::Const(v) => *v,
            DoubleView::Slice { data, nelem, .. } => {
                if *nelem == 1 {
                    data[r]
                } else {
                    data[r * nelem + e]
                }
            }
        }
    }

    #[inline]
    pub(crate) fn is_undef(&self, r: usize, e: usize) -> bool {
        match self {
            DoubleView::Const(_) => false,
            DoubleView::Slice { undef, nelem, .. } => {
                if *nelem == 1 {
                    undef[r] != 0
                } else {
                    undef[r * nelem + e] != 0
                }
            }
        }
    }
}

/// View over a Bool operand; bound columns store bytes
pub(crate) enum BoolView<'v> {
    Const(bool),
    Bools {
        data: &'v [bool],
        undef: &'v [u8],
        nelem: usize,
    },
    Bytes {
        data: &'v [u8],
        undef: &'v [u8],
        nelem: usize,
    },
}

impl<'v> BoolView<'v> {
    pub(crate) fn of(op: &'v Operand<'v>) -> Result<Self> {
        match op {
            Operand::Const(Scalar::Bool(v)) => Ok(BoolView::Const(*v)),
            Operand::Array(a) => match &a.buf {
                Buffer::Bool(data) => Ok(BoolView::Bools {
                    data,
                    undef: &a.undef,
                    nelem: a.nelem,
                }),
                _ => Err(Error::type_error("expected a BOOL operand")),
            },
            Operand::Column(BoundColumn::Bool { data, undef, nelem }) => Ok(BoolView::Bytes {
                data,
                undef,
                nelem: *nelem,
            }),
            _ => Err(Error::type_error("expected a BOOL operand")),
        }
    }

    #[inline]
    pub(crate) fn get(&self, r: usize, e: usize) -> bool {
        match self {
            BoolView::Const(v) => *v,
            BoolView::Bools { data, nelem, .. } => {
                if *nelem == 1 {
                    data[r]
                } else {
                    data[r * nelem + e]
                }
            }
            BoolView::Bytes { data, nelem, .. } => {
                let v = if *nelem == 1 {
                    data[r]
                } else {
                    data[r * nelem + e]
                };
                v != 0
            }
        }
    }

    #[inline]
    pub(crate) fn is_undef(&self, r: usize, e: usize) -> bool {
        match self {
            BoolView::Const(_) => false,
            BoolView::Bools { undef, nelem, .. } | BoolView::Bytes { undef, nelem, .. } => {
                if *nelem == 1 {
                    undef[r] != 0
                } else {
                    undef[r * nelem + e] != 0
                }
            }
        }
    }
}

/// View over a Str operand (always one value per row)
pub(crate) enum StrView<'v> {
    Const(&'v str),
    Rows {
        data: &'v [String],
        undef: &'v [u8],
    },
}

impl<'v> StrView<'v> {
    pub(crate) fn of(op: &'v Operand<'v>) -> Result<Self> {
        match op {
            Operand::Const(Scalar::Str(s)) => Ok(StrView::Const(s)),
            Operand::Array(a) => match &a.buf {
                Buffer::Str(data) => Ok(StrView::Rows {
                    data,
                    undef: &a.undef,
                }),
                _ => Err(Error::type_error("expected a STRING operand")),
            },
            Operand::Column(BoundColumn::Str { data, undef, .. }) => Ok(StrView::Rows {
                data,
                undef,
            }),
            _ => Err(Error::type_error("expected a STRING operand")),
        }
    }

    #[inline]
    pub(crate) fn get(&self, r: usize) -> &str {
        match self {
            StrView::Const(s) => s,
            StrView::Rows { data, .. } => &data[r],
        }
    }

    #[inline]
    pub(crate) fn is_undef(&self, r: usize) -> bool {
        match self {
            StrView::Const(_) => false,
            StrView::Rows { undef, .. } => undef[r] != 0,
        }
    }
}

/// View over a Bits operand (always one stream per row, no undef mask)
pub(crate) enum BitsView<'v> {
    Const(&'v str),
    Rows(&'v [String]),
}

impl<'v> BitsView<'v> {
    pub(crate) fn of(op: &'v Operand<'v>) -> Result<Self> {
        match op {
            Operand::Const(Scalar::Bits(s)) => Ok(BitsView::Const(s)),
            Operand::Array(a) => match &a.buf {
                Buffer::Bits(data) => Ok(BitsView::Rows(data)),
                _ => Err(Error::type_error("expected a BITSTR operand")),
            },
            Operand::Column(BoundColumn::Bits { rows, .. }) => Ok(BitsView::Rows(rows)),
            _ => Err(Error::type_error("expected a BITSTR operand")),
        }
    }

    #[inline]
    pub(crate) fn get(&self, r: usize) -> &str {
        match self {
            BitsView::Const(s) => s,
            BitsView::Rows(rows) => &rows[r],
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Tree-walking vectorized evaluator for one compiled expression
///
/// Borrows the compiled tree and a batch binding; owns the sticky error
/// status. Diagnostics go to the attached [`MessageSink`], randomness
/// comes from the attached [`RandomSource`].
pub struct Evaluator<'e> {
    pub(crate) expr: &'e CompiledExpr,
    pub(crate) ctx: &'e BindCtx<'e>,
    sink: Option<&'e mut dyn MessageSink>,
    rng: Option<&'e mut dyn RandomSource>,
    default_rng: DefaultRandom,
    status: Option<Error>,
    /// Parent count per node; nodes with more than one parent are
    /// evaluated once per pass
    refs: Vec<u32>,
    /// Per-pass buffer cache for multi-parent nodes
    shared: Vec<Option<ArrayValue>>,
}

impl<'e> Evaluator<'e> {
    /// Create an evaluator with a discarded message sink and the default
    /// random source
    pub fn new(expr: &'e CompiledExpr, ctx: &'e BindCtx<'e>) -> Self {
        let refs = reference_counts(expr);
        let shared = vec![None; expr.len()];
        Self {
            expr,
            ctx,
            sink: None,
            rng: None,
            default_rng: DefaultRandom::new(),
            status: None,
            refs,
            shared,
        }
    }

    /// Attach a message sink for diagnostics
    pub fn with_sink(mut self, sink: &'e mut dyn MessageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach a random source for `RANDOM()`
    pub fn with_random(mut self, rng: &'e mut dyn RandomSource) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Evaluate the expression over the bound batch
    ///
    /// The result holds `nrows * nelem` elements (one string per row for
    /// string and bit-string results). After an error every further call
    /// short-circuits with a clone of it.
    pub fn evaluate(&mut self) -> Result<ArrayValue> {
        if let Some(err) = &self.status {
            return Err(err.clone());
        }
        for slot in &mut self.shared {
            *slot = None;
        }
        match self.eval_node(self.expr.root()) {
            Ok(op) => Ok(self.materialize(op)),
            Err(err) => {
                self.message(&err.to_string());
                self.status = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Push one diagnostic line to the sink, if any
    pub(crate) fn message(&mut self, msg: &str) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.push(msg);
        }
    }

    /// Next uniform double in [0, 1)
    pub(crate) fn next_random(&mut self) -> f64 {
        match self.rng.as_deref_mut() {
            Some(rng) => rng.next_double(),
            None => self.default_rng.next_double(),
        }
    }

    /// Expand a root operand into an owned per-row result buffer
    fn materialize(&self, op: Operand<'e>) -> ArrayValue {
        let nrows = self.ctx.nrows();
        match op {
            Operand::Array(a) => a,
            Operand::Const(s) => match s {
                Scalar::Bool(v) => ArrayValue {
                    buf: Buffer::Bool(vec![v; nrows]),
                    undef: vec![0; nrows],
                    nelem: 1,
                },
                Scalar::Long(v) => ArrayValue {
                    buf: Buffer::Long(vec![v; nrows]),
                    undef: vec![0; nrows],
                    nelem: 1,
                },
                Scalar::Double(v) => ArrayValue {
                    buf: Buffer::Double(vec![v; nrows]),
                    undef: vec![0; nrows],
                    nelem: 1,
                },
                Scalar::Str(v) => ArrayValue {
                    buf: Buffer::Str(vec![v; nrows]),
                    undef: vec![0; nrows],
                    nelem: 1,
                },
                Scalar::Bits(v) => ArrayValue {
                    buf: Buffer::Bits(vec![v; nrows]),
                    undef: Vec::new(),
                    nelem: 1,
                },
            },
            Operand::Column(col) => match col {
                BoundColumn::Bool { data, undef, nelem } => ArrayValue {
                    buf: Buffer::Bool(data.iter().map(|&v| v != 0).collect()),
                    undef: undef.clone(),
                    nelem: *nelem,
                },
                BoundColumn::Long { data, undef, nelem } => ArrayValue {
                    buf: Buffer::Long(data.to_vec()),
                    undef: undef.clone(),
                    nelem: *nelem,
                },
                BoundColumn::Double { data, undef, nelem } => ArrayValue {
                    buf: Buffer::Double(data.to_vec()),
                    undef: undef.clone(),
                    nelem: *nelem,
                },
                BoundColumn::Str { data, undef, .. } => ArrayValue {
                    buf: Buffer::Str(data.to_vec()),
                    undef: undef.clone(),
                    nelem: 1,
                },
                BoundColumn::Bits { rows, .. } => ArrayValue {
                    buf: Buffer::Bits(rows.clone()),
                    undef: Vec::new(),
                    nelem: 1,
                },
            },
        }
    }

    /// Recursive post-order walk
    ///
    /// A node with more than one parent is computed once per pass;
    /// later consumers get a clone of the cached buffer.
    pub(crate) fn eval_node(&mut self, id: NodeId) -> Result<Operand<'e>> {
        let cached = self.refs[id] > 1;
        if cached {
            if let Some(value) = &self.shared[id] {
                return Ok(Operand::Array(value.clone()));
            }
        }
        let result = self.eval_node_uncached(id)?;
        if cached {
            if let Operand::Array(value) = &result {
                self.shared[id] = Some(value.clone());
            }
        }
        Ok(result)
    }

    fn eval_node_uncached(&mut self, id: NodeId) -> Result<Operand<'e>> {
        let expr = self.expr;
        let ctx = self.ctx;
        let node = expr.node(id);
        match &node.kind {
            NodeKind::Const(s) => Ok(Operand::Const(s.clone())),
            NodeKind::Column(idx) => Ok(Operand::Column(ctx.column(*idx)?)),
            NodeKind::RowNum => {
                let base = ctx.first_row() + ctx.row_offset();
                let data: Vec<i64> = (0..ctx.nrows()).map(|i| base + i as i64).collect();
                let undef = vec![0; data.len()];
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem: 1,
                }))
            }
            NodeKind::Unary(op, child) => {
                let value = self.eval_node(*child)?;
                self.eval_unary(*op, value, node)
            }
            NodeKind::Binary(op, a, b) => {
                let va = self.eval_node(*a)?;
                let vb = self.eval_node(*b)?;
                self.eval_binary(*op, va, vb, node)
            }
            NodeKind::Func(op, args) => self.eval_func(*op, args, node),
            NodeKind::Deref(var, dims) => self.eval_deref(*var, dims, node),
        }
    }

    // =========================================================================
    // Unary kernels
    // =========================================================================

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        value: Operand<'e>,
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        match op {
            UnaryOp::Neg => match value.kind() {
                ValueKind::Long => {
                    let view = LongView::of(&value)?;
                    let (data, undef) =
                        map_long(nrows, nelem, |r, e| (view.get(r, e), view.is_undef(r, e)), |x| {
                            Ok(x.wrapping_neg())
                        })?;
                    Ok(Operand::Array(ArrayValue {
                        buf: Buffer::Long(data),
                        undef,
                        nelem,
                    }))
                }
                _ => {
                    let view = DoubleView::of(&value)?;
                    let (data, undef) = map_double(
                        nrows,
                        nelem,
                        |r, e| (view.get(r, e), view.is_undef(r, e)),
                        |x| Ok(-x),
                    )?;
                    Ok(Operand::Array(ArrayValue {
                        buf: Buffer::Double(data),
                        undef,
                        nelem,
                    }))
                }
            },

            UnaryOp::Not => {
                let view = BoolView::of(&value)?;
                let total = nrows * nelem;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    for e in 0..nelem {
                        let i = r * nelem + e;
                        if view.is_undef(r, e) {
                            undef[i] = 1;
                            data.push(false);
                        } else {
                            data.push(!view.get(r, e));
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bool(data),
                    undef,
                    nelem,
                }))
            }

            UnaryOp::BitNot => {
                let view = BitsView::of(&value)?;
                let rows: Vec<String> = (0..nrows).map(|r| bits::bits_not(view.get(r))).collect();
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bits(rows),
                    undef: Vec::new(),
                    nelem: 1,
                }))
            }

            UnaryOp::CastLong => match value.kind() {
                ValueKind::Bool => {
                    let view = BoolView::of(&value)?;
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
                                data.push(i64::from(view.get(r, e)));
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
                                data.push(0);
                            } else {
                                data.push(view.get(r, e) as i64);
                            }
                        }
                    }
                    Ok(Operand::Array(ArrayValue {
                        buf: Buffer::Long(data),
                        undef,
                        nelem,
                    }))
                }
            },

            UnaryOp::CastDouble => match value.kind() {
                ValueKind::Bool => {
                    let view = BoolView::of(&value)?;
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
                                data.push(if view.get(r, e) { 1.0 } else { 0.0 });
                            }
                        }
                    }
                    Ok(Operand::Array(ArrayValue {
                        buf: Buffer::Double(data),
                        undef,
                        nelem,
                    }))
                }
                _ => {
                    let view = LongView::of(&value)?;
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
                                data.push(view.get(r, e) as f64);
                            }
                        }
                    }
                    Ok(Operand::Array(ArrayValue {
                        buf: Buffer::Double(data),
                        undef,
                        nelem,
                    }))
                }
            },
        }
    }

    // =========================================================================
    // Binary kernels
    // =========================================================================

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        a: Operand<'e>,
        b: Operand<'e>,
        node: &Node,
    ) -> Result<Operand<'e>> {
        // Kernel selection follows the first operand's kind; promotion
        // during parse already equalized numeric kinds
        match a.kind() {
            ValueKind::Bits => self.eval_bits_binary(op, &a, &b),
            ValueKind::Str => self.eval_str_compare(op, &a, &b),
            ValueKind::Bool => self.eval_bool_binary(op, &a, &b, node),
            ValueKind::Long => self.eval_long_binary(op, &a, &b, node),
            ValueKind::Double => self.eval_double_binary(op, &a, &b, node),
        }
    }

    fn eval_long_binary(
        &mut self,
        op: BinaryOp,
        a: &Operand<'e>,
        b: &Operand<'e>,
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let va = LongView::of(a)?;
        let vb = LongView::of(b)?;

        if matches!(
            op,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        ) {
            let total = nrows * nelem;
            let mut data = Vec::with_capacity(total);
            let mut undef = vec![0u8; total];
            for r in 0..nrows {
                for e in 0..nelem {
                    let i = r * nelem + e;
                    if va.is_undef(r, e) || vb.is_undef(r, e) {
                        undef[i] = 1;
                        data.push(false);
                        continue;
                    }
                    let (x, y) = (va.get(r, e), vb.get(r, e));
                    data.push(compare(op, &x, &y));
                }
            }
            return Ok(Operand::Array(ArrayValue {
                buf: Buffer::Bool(data),
                undef,
                nelem,
            }));
        }

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        let mut undef = vec![0u8; total];
        for r in 0..nrows {
            for e in 0..nelem {
                let i = r * nelem + e;
                if va.is_undef(r, e) || vb.is_undef(r, e) {
                    undef[i] = 1;
                    data.push(0);
                    continue;
                }
                let (x, y) = (va.get(r, e), vb.get(r, e));
                let v = match op {
                    BinaryOp::Add => x.wrapping_add(y),
                    BinaryOp::Sub => x.wrapping_sub(y),
                    BinaryOp::Mul => x.wrapping_mul(y),
                    BinaryOp::Div => {
                        if y == 0 {
                            return Err(Error::DivisionByZero);
                        }
                        x.wrapping_div(y)
                    }
                    BinaryOp::Mod => {
                        if y == 0 {
                            return Err(Error::DivisionByZero);
                        }
                        x.wrapping_rem(y)
                    }
                    BinaryOp::Pow => (x as f64).powf(y as f64) as i64,
                    BinaryOp::BitAnd => x & y,
                    BinaryOp::BitOr => x | y,
                    other => {
                        return Err(Error::type_error(format!(
                            "operator '{}' not defined for LONG",
                            other
                        )));
                    }
                };
                data.push(v);
            }
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Long(data),
            undef,
            nelem,
        }))
    }

    fn eval_double_binary(
        &mut self,
        op: BinaryOp,
        a: &Operand<'e>,
        b: &Operand<'e>,
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let va = DoubleView::of(a)?;
        let vb = DoubleView::of(b)?;

        if matches!(
            op,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        ) {
            let total = nrows * nelem;
            let mut data = Vec::with_capacity(total);
            let mut undef = vec![0u8; total];
            for r in 0..nrows {
                for e in 0..nelem {
                    let i = r * nelem + e;
                    if va.is_undef(r, e) || vb.is_undef(r, e) {
                        undef[i] = 1;
                        data.push(false);
                        continue;
                    }
                    let (x, y) = (va.get(r, e), vb.get(r, e));
                    data.push(compare(op, &x, &y));
                }
            }
            return Ok(Operand::Array(ArrayValue {
                buf: Buffer::Bool(data),
                undef,
                nelem,
            }));
        }

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        let mut undef = vec![0u8; total];
        for r in 0..nrows {
            for e in 0..nelem {
                let i = r * nelem + e;
                if va.is_undef(r, e) || vb.is_undef(r, e) {
                    undef[i] = 1;
                    data.push(0.0);
                    continue;
                }
                let (x, y) = (va.get(r, e), vb.get(r, e));
                let v = match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                    BinaryOp::Div => {
                        if y == 0.0 {
                            return Err(Error::DivisionByZero);
                        }
                        x / y
                    }
                    BinaryOp::Mod => {
                        if y == 0.0 {
                            return Err(Error::DivisionByZero);
                        }
                        x - y * (x / y).trunc()
                    }
                    BinaryOp::Pow => x.powf(y),
                    other => {
                        return Err(Error::type_error(format!(
                            "operator '{}' not defined for DOUBLE",
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

    fn eval_bool_binary(
        &mut self,
        op: BinaryOp,
        a: &Operand<'e>,
        b: &Operand<'e>,
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let nelem = node.shape.nelem;
        let va = BoolView::of(a)?;
        let vb = BoolView::of(b)?;

        // '&' / '|' on booleans are the logical operators
        let op = match op {
            BinaryOp::BitAnd => BinaryOp::And,
            BinaryOp::BitOr => BinaryOp::Or,
            other => other,
        };

        let total = nrows * nelem;
        let mut data = Vec::with_capacity(total);
        let mut undef = vec![0u8; total];
        for r in 0..nrows {
            for e in 0..nelem {
                let i = r * nelem + e;
                let (ua, ub) = (va.is_undef(r, e), vb.is_undef(r, e));
                let (x, y) = (va.get(r, e), vb.get(r, e));
                match op {
                    BinaryOp::And => {
                        if ua || ub {
                            undef[i] = 1;
                            data.push(false);
                        } else {
                            data.push(x && y);
                        }
                    }
                    BinaryOp::Or => {
                        // Defined-true dominates an undefined side
                        if (!ua && x) || (!ub && y) {
                            data.push(true);
                        } else if ua || ub {
                            undef[i] = 1;
                            data.push(false);
                        } else {
                            data.push(false);
                        }
                    }
                    BinaryOp::Eq | BinaryOp::Ne => {
                        if ua || ub {
                            undef[i] = 1;
                            data.push(false);
                        } else {
                            data.push(if op == BinaryOp::Eq { x == y } else { x != y });
                        }
                    }
                    other => {
                        return Err(Error::type_error(format!(
                            "operator '{}' not defined for BOOL",
                            other
                        )));
                    }
                }
            }
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Bool(data),
            undef,
            nelem,
        }))
    }

    fn eval_str_compare(
        &mut self,
        op: BinaryOp,
        a: &Operand<'e>,
        b: &Operand<'e>,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let va = StrView::of(a)?;
        let vb = StrView::of(b)?;

        let mut data = Vec::with_capacity(nrows);
        let mut undef = vec![0u8; nrows];
        for r in 0..nrows {
            if va.is_undef(r) || vb.is_undef(r) {
                undef[r] = 1;
                data.push(false);
                continue;
            }
            let (x, y) = (va.get(r), vb.get(r));
            data.push(compare(op, &x, &y));
        }
        Ok(Operand::Array(ArrayValue {
            buf: Buffer::Bool(data),
            undef,
            nelem: 1,
        }))
    }

    fn eval_bits_binary(
        &mut self,
        op: BinaryOp,
        a: &Operand<'e>,
        b: &Operand<'e>,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let va = BitsView::of(a)?;
        let vb = BitsView::of(b)?;

        match op {
            BinaryOp::Add | BinaryOp::BitAnd | BinaryOp::BitOr => {
                let rows: Vec<String> = (0..nrows)
                    .map(|r| {
                        let (x, y) = (va.get(r), vb.get(r));
                        match op {
                            BinaryOp::Add => bits::bits_concat(x, y),
                            BinaryOp::BitAnd => bits::bits_and(x, y),
                            _ => bits::bits_or(x, y),
                        }
                    })
                    .collect();
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bits(rows),
                    undef: Vec::new(),
                    nelem: 1,
                }))
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
            | BinaryOp::Ge => {
                let mut data = Vec::with_capacity(nrows);
                for r in 0..nrows {
                    let (x, y) = (va.get(r), vb.get(r));
                    let v = match op {
                        BinaryOp::Eq => bits::bits_eq(x, y),
                        BinaryOp::Ne => !bits::bits_eq(x, y),
                        _ => compare(op, &bits::bits_to_long(x), &bits::bits_to_long(y)),
                    };
                    data.push(v);
                }
                let undef = vec![0u8; nrows];
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bool(data),
                    undef,
                    nelem: 1,
                }))
            }
            other => Err(Error::type_error(format!(
                "operator '{}' not defined for BITSTR",
                other
            ))),
        }
    }

    // =========================================================================
    // Dereference
    // =========================================================================

    fn eval_deref(
        &mut self,
        var: NodeId,
        dims: &[NodeId],
        node: &Node,
    ) -> Result<Operand<'e>> {
        let nrows = self.ctx.nrows();
        let vshape = self.expr.node(var).shape;
        let vkind = self.expr.node(var).dtype;
        let out_nelem = node.shape.nelem;

        let var_value = self.eval_node(var)?;
        let mut dim_values = Vec::with_capacity(dims.len());
        for &dim in dims {
            dim_values.push(self.eval_node(dim)?);
        }
        let dim_views: Vec<LongView<'_>> = dim_values
            .iter()
            .map(LongView::of)
            .collect::<Result<_>>()?;

        let full = dims.len() == vshape.naxis;

        // Per-row flat element offset into the variable
        let offset_for = |r: usize| -> Result<usize> {
            if full {
                let mut offset = 0usize;
                let mut stride = 1usize;
                for (axis, view) in dim_views.iter().enumerate() {
                    if view.is_undef(r, 0) {
                        return Err(Error::NullVectorIndex);
                    }
                    let idx = view.get(r, 0);
                    let bound = vshape.naxes[axis];
                    if idx < 1 || idx > bound as i64 {
                        return Err(Error::IndexOutOfRange { index: idx, bound });
                    }
                    offset += (idx as usize - 1) * stride;
                    stride *= bound;
                }
                Ok(offset)
            } else {
                let view = &dim_views[0];
                if view.is_undef(r, 0) {
                    return Err(Error::NullVectorIndex);
                }
                let idx = view.get(r, 0);
                let bound = vshape.naxes[vshape.naxis - 1];
                if idx < 1 || idx > bound as i64 {
                    return Err(Error::IndexOutOfRange { index: idx, bound });
                }
                Ok((idx as usize - 1) * out_nelem)
            }
        };

        let total = nrows * out_nelem;
        match vkind {
            ValueKind::Long => {
                let view = LongView::of(&var_value)?;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    let offset = offset_for(r)?;
                    for e in 0..out_nelem {
                        let i = r * out_nelem + e;
                        if view.is_undef(r, offset + e) {
                            undef[i] = 1;
                            data.push(0);
                        } else {
                            data.push(view.get(r, offset + e));
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Long(data),
                    undef,
                    nelem: out_nelem,
                }))
            }
            ValueKind::Double => {
                let view = DoubleView::of(&var_value)?;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    let offset = offset_for(r)?;
                    for e in 0..out_nelem {
                        let i = r * out_nelem + e;
                        if view.is_undef(r, offset + e) {
                            undef[i] = 1;
                            data.push(0.0);
                        } else {
                            data.push(view.get(r, offset + e));
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Double(data),
                    undef,
                    nelem: out_nelem,
                }))
            }
            ValueKind::Bool => {
                let view = BoolView::of(&var_value)?;
                let mut data = Vec::with_capacity(total);
                let mut undef = vec![0u8; total];
                for r in 0..nrows {
                    let offset = offset_for(r)?;
                    for e in 0..out_nelem {
                        let i = r * out_nelem + e;
                        if view.is_undef(r, offset + e) {
                            undef[i] = 1;
                            data.push(false);
                        } else {
                            data.push(view.get(r, offset + e));
                        }
                    }
                }
                Ok(Operand::Array(ArrayValue {
                    buf: Buffer::Bool(data),
                    undef,
                    nelem: out_nelem,
                }))
            }
            other => Err(Error::type_error(format!("cannot subscript {}", other))),
        }
    }
}

/// Parent count per node; the root counts as one
fn reference_counts(expr: &CompiledExpr) -> Vec<u32> {
    let mut counts = vec![0u32; expr.len()];
    counts[expr.root()] += 1;
    for id in 0..expr.len() {
        match &expr.node(id).kind {
            NodeKind::Unary(_, c) => counts[*c] += 1,
            NodeKind::Binary(_, a, b) => {
                counts[*a] += 1;
                counts[*b] += 1;
            }
            NodeKind::Func(_, args) => {
                for arg in args {
                    counts[*arg] += 1;
                }
            }
            NodeKind::Deref(var, dims) => {
                counts[*var] += 1;
                for dim in dims {
                    counts[*dim] += 1;
                }
            }
            _ => {}
        }
    }
    counts
}

/// Elementwise comparison dispatch shared by the typed kernels
fn compare<T: PartialOrd>(op: BinaryOp, x: &T, y: &T) -> bool {
    match op {
        BinaryOp::Eq => x == y,
        BinaryOp::Ne => x != y,
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        BinaryOp::Ge => x >= y,
        _ => false,
    }
}

/// Elementwise Long map with null passthrough
fn map_long(
    nrows: usize,
    nelem: usize,
    src: impl Fn(usize, usize) -> (i64, bool),
    f: impl Fn(i64) -> Result<i64>,
) -> Result<(Vec<i64>, Vec<u8>)> {
    let total = nrows * nelem;
    let mut data = Vec::with_capacity(total);
    let mut undef = vec![0u8; total];
    for r in 0..nrows {
        for e in 0..nelem {
            let i = r * nelem + e;
            let (x, ux) = src(r, e);
            if ux {
                undef[i] = 1;
                data.push(0);
            } else {
                data.push(f(x)?);
            }
        }
    }
    Ok((data, undef))
}

/// Elementwise Double map with null passthrough
fn map_double(
    nrows: usize,
    nelem: usize,
    src: impl Fn(usize, usize) -> (f64, bool),
    f: impl Fn(f64) -> Result<f64>,
) -> Result<(Vec<f64>, Vec<u8>)> {
    let total = nrows * nelem;
    let mut data = Vec::with_capacity(total);
    let mut undef = vec![0u8; total];
    for r in 0..nrows {
        for e in 0..nelem {
            let i = r * nelem + e;
            let (x, ux) = src(r, e);
            if ux {
                undef[i] = 1;
                data.push(0.0);
            } else {
                data.push(f(x)?);
            }
        }
    }
    Ok((data, undef))
}

impl CompiledExpr {
    /// Evaluate this expression over a bound batch with default sink and
    /// random source
    ///
    /// Build an [`Evaluator`] directly to attach a [`MessageSink`] or a
    /// seeded [`RandomSource`], or to reuse sticky-error state across
    /// calls.
    pub fn evaluate(&self, ctx: &BindCtx<'_>) -> Result<ArrayValue> {
        Evaluator::new(self, ctx).evaluate()
    }
}
