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

//! Tree builders
//!
//! The parser emits nodes exclusively through [`TreeBuilder`]. Each
//! builder method type-checks its operands, inserts promotion casts, and
//! folds literal-only subtrees on the spot, so a fully constant
//! expression compiles to a single constant node.

use smallvec::SmallVec;

use crate::core::{ColInfo, EngineConfig, Scalar, Shape, ValueKind};
use crate::engine::bits;
use crate::functions::FuncOp;
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::token::Position;

use super::{BinaryOp, CompiledExpr, Node, NodeId, NodeKind, UnaryOp};

/// Arena-backed node factory used during parse
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
    config: EngineConfig,
}

impl TreeBuilder {
    pub(crate) fn new(config: EngineConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
        }
    }

    /// Borrow a node by index
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Allocate a constant node
    ///
    /// Bit-string constants carry their bit count as a one-axis shape;
    /// all other constants are scalars.
    pub(crate) fn new_const(&mut self, value: Scalar) -> NodeId {
        let dtype = value.kind();
        let shape = match &value {
            Scalar::Bits(s) => Shape::vector(s.len()),
            _ => Shape::scalar(),
        };
        self.push(Node {
            kind: NodeKind::Const(value),
            dtype,
            shape,
        })
    }

    /// Allocate a column reference node
    pub(crate) fn new_column(
        &mut self,
        idx: usize,
        info: &ColInfo,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        if info.kind == ValueKind::Bits && info.shape.nelem > self.config.max_bits_len {
            return Err(ParseError::syntax(
                format!(
                    "bit column {} wider than {} bits",
                    info.name, self.config.max_bits_len
                ),
                pos,
            ));
        }
        Ok(self.push(Node {
            kind: NodeKind::Column(idx),
            dtype: info.kind,
            shape: info.shape,
        }))
    }

    /// Allocate a `#ROW` node
    pub(crate) fn new_row_ref(&mut self) -> NodeId {
        self.push(Node {
            kind: NodeKind::RowNum,
            dtype: ValueKind::Long,
            shape: Shape::scalar(),
        })
    }

    /// Build a unary operation, folding constant children in place
    ///
    /// No-op casts return the child unchanged.
    pub(crate) fn new_unary(
        &mut self,
        op: UnaryOp,
        child: NodeId,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        let kind = self.nodes[child].dtype;

        // Check operand kind; negation of a boolean goes through Long
        let child = match op {
            UnaryOp::Neg => {
                if !kind.is_numeric() {
                    return Err(self.type_err(format!("operand of '-' is {}", kind), pos));
                }
                if kind == ValueKind::Bool {
                    self.new_unary(UnaryOp::CastLong, child, pos)?
                } else {
                    child
                }
            }
            UnaryOp::Not => {
                if kind != ValueKind::Bool {
                    return Err(self.type_err(format!("operand of NOT is {}", kind), pos));
                }
                child
            }
            UnaryOp::BitNot => {
                if kind != ValueKind::Bits {
                    return Err(self.type_err(format!("operand of '~' is {}", kind), pos));
                }
                child
            }
            UnaryOp::CastLong | UnaryOp::CastDouble => {
                if !kind.is_numeric() {
                    return Err(self.type_err(format!("cannot cast {}", kind), pos));
                }
                let target = if op == UnaryOp::CastLong {
                    ValueKind::Long
                } else {
                    ValueKind::Double
                };
                if kind == target {
                    return Ok(child); // no-op cast
                }
                child
            }
        };

        // Constant child: mutate in place and return it
        if let NodeKind::Const(value) = &self.nodes[child].kind {
            let folded = fold_unary(op, value);
            self.nodes[child].dtype = folded.kind();
            self.nodes[child].kind = NodeKind::Const(folded);
            return Ok(child);
        }

        let dtype = match op {
            UnaryOp::Neg => self.nodes[child].dtype,
            UnaryOp::Not => ValueKind::Bool,
            UnaryOp::BitNot => ValueKind::Bits,
            UnaryOp::CastLong => ValueKind::Long,
            UnaryOp::CastDouble => ValueKind::Double,
        };
        let shape = self.nodes[child].shape;
        Ok(self.push(Node {
            kind: NodeKind::Unary(op, child),
            dtype,
            shape,
        }))
    }

    /// Build a binary operation with promotion, shape checks and folding
    pub(crate) fn new_binary(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        let (ka, kb) = (self.nodes[a].dtype, self.nodes[b].dtype);

        match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => {
                if ka == ValueKind::Bits && kb == ValueKind::Bits {
                    if op != BinaryOp::Add {
                        return Err(
                            self.type_err(format!("'{}' not defined for bit strings", op), pos)
                        );
                    }
                    return self.bits_binary(op, a, b, pos);
                }
                self.numeric_binary(op, a, b, pos, ValueKind::Long)
            }

            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
            | BinaryOp::Ge => {
                if ka == ValueKind::Str && kb == ValueKind::Str {
                    return self.string_compare(op, a, b);
                }
                if ka == ValueKind::Bits && kb == ValueKind::Bits {
                    return self.bits_binary(op, a, b, pos);
                }
                if !ka.is_numeric() || !kb.is_numeric() {
                    return Err(
                        self.type_err(format!("cannot compare {} with {}", ka, kb), pos)
                    );
                }
                // Booleans may meet '==' / '!=' directly; ordering goes
                // through Long
                let needs_long = !matches!(op, BinaryOp::Eq | BinaryOp::Ne);
                let floor = if needs_long {
                    ValueKind::Long
                } else {
                    ValueKind::Bool
                };
                self.numeric_compare(op, a, b, pos, floor)
            }

            BinaryOp::And | BinaryOp::Or => {
                if ka != ValueKind::Bool || kb != ValueKind::Bool {
                    return Err(
                        self.type_err(format!("'{}' requires boolean operands", op), pos)
                    );
                }
                self.checked_result(op, a, b, ValueKind::Bool, pos)
            }

            BinaryOp::BitAnd | BinaryOp::BitOr => {
                if ka == ValueKind::Bool && kb == ValueKind::Bool {
                    // '&' / '|' on booleans are the logical operators
                    let logical = if op == BinaryOp::BitAnd {
                        BinaryOp::And
                    } else {
                        BinaryOp::Or
                    };
                    return self.new_binary(logical, a, b, pos);
                }
                if ka == ValueKind::Bits && kb == ValueKind::Bits {
                    return self.bits_binary(op, a, b, pos);
                }
                if !ka.is_numeric() || !kb.is_numeric() {
                    return Err(
                        self.type_err(format!("'{}' not defined for {} and {}", op, ka, kb), pos)
                    );
                }
                if ka == ValueKind::Double || kb == ValueKind::Double {
                    return Err(
                        self.type_err(format!("'{}' requires integer operands", op), pos)
                    );
                }
                let a = self.promote_to(a, ValueKind::Long, pos)?;
                let b = self.promote_to(b, ValueKind::Long, pos)?;
                self.checked_result(op, a, b, ValueKind::Long, pos)
            }
        }
    }

    /// Arithmetic: promote both sides to a common kind (at least `floor`)
    fn numeric_binary(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
        pos: Position,
        floor: ValueKind,
    ) -> Result<NodeId, ParseError> {
        let (ka, kb) = (self.nodes[a].dtype, self.nodes[b].dtype);
        if !ka.is_numeric() || !kb.is_numeric() {
            return Err(self.type_err(format!("'{}' not defined for {} and {}", op, ka, kb), pos));
        }
        let mut common = ValueKind::promoted(ka, kb).unwrap();
        if common.rank() < floor.rank() {
            common = floor;
        }
        let a = self.promote_to(a, common, pos)?;
        let b = self.promote_to(b, common, pos)?;
        self.checked_result(op, a, b, common, pos)
    }

    /// Numeric comparison yielding Bool
    fn numeric_compare(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
        pos: Position,
        floor: ValueKind,
    ) -> Result<NodeId, ParseError> {
        let (ka, kb) = (self.nodes[a].dtype, self.nodes[b].dtype);
        let mut common = ValueKind::promoted(ka, kb).unwrap();
        if common.rank() < floor.rank() {
            common = floor;
        }
        let a = self.promote_to(a, common, pos)?;
        let b = self.promote_to(b, common, pos)?;
        self.checked_result(op, a, b, ValueKind::Bool, pos)
    }

    /// String comparison yielding a per-row Bool
    fn string_compare(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
    ) -> Result<NodeId, ParseError> {
        if let (Some(sa), Some(sb)) = (self.nodes[a].as_const(), self.nodes[b].as_const()) {
            let folded = fold_string_compare(op, sa.as_str().unwrap(), sb.as_str().unwrap());
            return Ok(self.fold_into(a, folded));
        }
        Ok(self.push(Node {
            kind: NodeKind::Binary(op, a, b),
            dtype: ValueKind::Bool,
            shape: Shape::scalar(),
        }))
    }

    /// Bit-string binary operations
    fn bits_binary(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        let (la, lb) = (self.nodes[a].shape.nelem, self.nodes[b].shape.nelem);
        let (dtype, shape) = match op {
            BinaryOp::Add => {
                if la + lb > self.config.max_bits_len {
                    return Err(ParseError::syntax(
                        format!(
                            "bit-string result wider than {} bits",
                            self.config.max_bits_len
                        ),
                        pos,
                    ));
                }
                (ValueKind::Bits, Shape::vector(la + lb))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr => (ValueKind::Bits, Shape::vector(la.max(lb))),
            _ => (ValueKind::Bool, Shape::scalar()),
        };

        if let (Some(sa), Some(sb)) = (self.nodes[a].as_const(), self.nodes[b].as_const()) {
            let folded = fold_bits_binary(op, sa.as_str().unwrap(), sb.as_str().unwrap());
            return Ok(self.fold_into(a, folded));
        }

        Ok(self.push(Node {
            kind: NodeKind::Binary(op, a, b),
            dtype,
            shape,
        }))
    }

    /// Shape-check two promoted operands, fold if constant, else allocate
    fn checked_result(
        &mut self,
        op: BinaryOp,
        a: NodeId,
        b: NodeId,
        dtype: ValueKind,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        if !self.test_dims(a, b) {
            return Err(ParseError::new(
                ParseErrorKind::ShapeMismatch,
                format!(
                    "operand shapes {} and {} do not match",
                    self.nodes[a].shape, self.nodes[b].shape
                ),
                pos,
            ));
        }

        if let (Some(sa), Some(sb)) = (self.nodes[a].as_const(), self.nodes[b].as_const()) {
            let folded = fold_binary(op, &sa.clone(), &sb.clone(), pos)?;
            return Ok(self.fold_into(a, folded));
        }

        let shape = if self.nodes[a].shape.is_scalar() {
            self.nodes[b].shape
        } else {
            self.nodes[a].shape
        };
        Ok(self.push(Node {
            kind: NodeKind::Binary(op, a, b),
            dtype,
            shape,
        }))
    }

    /// Build a function call
    ///
    /// `NELEM` folds to its compile-time constant; the other functions
    /// allocate a node.
    pub(crate) fn new_func(
        &mut self,
        op: FuncOp,
        args: Vec<NodeId>,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        if args.len() != op.arity() {
            return Err(ParseError::new(
                ParseErrorKind::WrongArity,
                format!(
                    "{}(...) expects {} argument(s), got {}",
                    op.name(),
                    op.arity(),
                    args.len()
                ),
                pos,
            ));
        }

        match op {
            FuncOp::Nelem => {
                let kind = self.nodes[args[0]].dtype;
                if kind == ValueKind::Str {
                    return Err(self.type_err("NELEM of a string", pos));
                }
                let nelem = self.nodes[args[0]].shape.nelem;
                Ok(self.new_const(Scalar::Long(nelem as i64)))
            }

            FuncOp::Sum => {
                let kind = self.nodes[args[0]].dtype;
                let dtype = match kind {
                    ValueKind::Bool | ValueKind::Long | ValueKind::Bits => ValueKind::Long,
                    ValueKind::Double => ValueKind::Double,
                    ValueKind::Str => return Err(self.type_err("SUM of a string", pos)),
                };
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(args)),
                    dtype,
                    shape: Shape::scalar(),
                }))
            }

            FuncOp::Abs => {
                let kind = self.nodes[args[0]].dtype;
                if !kind.is_numeric() {
                    return Err(self.type_err(format!("ABS of {}", kind), pos));
                }
                let arg = if kind == ValueKind::Bool {
                    self.new_unary(UnaryOp::CastLong, args[0], pos)?
                } else {
                    args[0]
                };
                let dtype = self.nodes[arg].dtype;
                let shape = self.nodes[arg].shape;
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(vec![arg])),
                    dtype,
                    shape,
                }))
            }

            _ if op.is_unary_math() => {
                let arg = self.promote_to_double(args[0], pos)?;
                let shape = self.nodes[arg].shape;
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(vec![arg])),
                    dtype: ValueKind::Double,
                    shape,
                }))
            }

            FuncOp::ArcTan2 => {
                let a = self.promote_to_double(args[0], pos)?;
                let b = self.promote_to_double(args[1], pos)?;
                if !self.test_dims(a, b) {
                    return Err(ParseError::new(
                        ParseErrorKind::ShapeMismatch,
                        "ARCTAN2 operand shapes do not match",
                        pos,
                    ));
                }
                let shape = if self.nodes[a].shape.is_scalar() {
                    self.nodes[b].shape
                } else {
                    self.nodes[a].shape
                };
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(vec![a, b])),
                    dtype: ValueKind::Double,
                    shape,
                }))
            }

            FuncOp::Random => Ok(self.push(Node {
                kind: NodeKind::Func(op, SmallVec::new()),
                dtype: ValueKind::Double,
                shape: Shape::scalar(),
            })),

            FuncOp::IsNull => {
                let kind = self.nodes[args[0]].dtype;
                if kind == ValueKind::Bits {
                    return Err(self.type_err("ISNULL of a bit string", pos));
                }
                let shape = self.nodes[args[0]].shape;
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(args)),
                    dtype: ValueKind::Bool,
                    shape,
                }))
            }

            FuncOp::DefNull => {
                let (ka, kb) = (self.nodes[args[0]].dtype, self.nodes[args[1]].dtype);
                let (a, b, dtype) = if ka == ValueKind::Str && kb == ValueKind::Str {
                    (args[0], args[1], ValueKind::Str)
                } else if ka.is_numeric() && kb.is_numeric() {
                    let common = ValueKind::promoted(ka, kb).unwrap();
                    let a = self.promote_to(args[0], common, pos)?;
                    let b = self.promote_to(args[1], common, pos)?;
                    (a, b, common)
                } else {
                    return Err(
                        self.type_err(format!("DEFNULL of {} and {}", ka, kb), pos)
                    );
                };
                if !self.test_dims(a, b) {
                    return Err(ParseError::new(
                        ParseErrorKind::ShapeMismatch,
                        "DEFNULL operand shapes do not match",
                        pos,
                    ));
                }
                let shape = if self.nodes[a].shape.is_scalar() {
                    self.nodes[b].shape
                } else {
                    self.nodes[a].shape
                };
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(vec![a, b])),
                    dtype,
                    shape,
                }))
            }

            _ if op.is_geometry() => {
                let mut coerced = Vec::with_capacity(args.len());
                for arg in args {
                    if self.nodes[arg].shape.nelem != 1 {
                        return Err(ParseError::new(
                            ParseErrorKind::ShapeMismatch,
                            format!("array argument not allowed in {}", op.name()),
                            pos,
                        ));
                    }
                    coerced.push(self.promote_to_double(arg, pos)?);
                }
                Ok(self.push(Node {
                    kind: NodeKind::Func(op, SmallVec::from_vec(coerced)),
                    dtype: ValueKind::Bool,
                    shape: Shape::scalar(),
                }))
            }

            _ => Err(ParseError::new(
                ParseErrorKind::UnknownFunction,
                format!("Function {}(...) not supported", op.name()),
                pos,
            )),
        }
    }

    /// Build a vector dereference
    ///
    /// Either every axis is subscripted (full scalarization) or a single
    /// subscript strips the last axis of a multi-axis variable; the
    /// latter requires a constant subscript.
    pub(crate) fn new_deref(
        &mut self,
        var: NodeId,
        dims: Vec<NodeId>,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        let vnode = &self.nodes[var];
        let vkind = vnode.dtype;
        let vshape = vnode.shape;

        if vkind == ValueKind::Str || vkind == ValueKind::Bits {
            return Err(self.type_err(format!("cannot subscript a {} value", vkind), pos));
        }
        if vshape.nelem <= 1 {
            return Err(ParseError::new(
                ParseErrorKind::ShapeMismatch,
                "cannot subscript a scalar value",
                pos,
            ));
        }
        if dims.is_empty() || (dims.len() != vshape.naxis && dims.len() != 1) {
            return Err(ParseError::new(
                ParseErrorKind::ShapeMismatch,
                format!(
                    "expected 1 or {} subscript(s), got {}",
                    vshape.naxis,
                    dims.len()
                ),
                pos,
            ));
        }

        for &dim in &dims {
            let dnode = &self.nodes[dim];
            if dnode.dtype != ValueKind::Long {
                return Err(self.type_err("vector subscripts must be integers", pos));
            }
            if !dnode.shape.is_scalar() {
                return Err(ParseError::new(
                    ParseErrorKind::ShapeMismatch,
                    "vector subscripts must be scalars",
                    pos,
                ));
            }
        }

        let full = dims.len() == vshape.naxis;
        if full {
            // Validate constant subscripts against their axes now
            for (axis, &dim) in dims.iter().enumerate() {
                if let Some(Scalar::Long(idx)) = self.nodes[dim].as_const() {
                    let bound = vshape.naxes[axis];
                    if *idx < 1 || *idx > bound as i64 {
                        return Err(ParseError::syntax(
                            format!("vector index {} out of range 1..{}", idx, bound),
                            pos,
                        ));
                    }
                }
            }
            Ok(self.push(Node {
                kind: NodeKind::Deref(var, SmallVec::from_vec(dims)),
                dtype: vkind,
                shape: Shape::scalar(),
            }))
        } else {
            // Single subscript on a multi-axis variable strips the last
            // axis and must be constant
            let last_axis = vshape.naxes[vshape.naxis - 1];
            match self.nodes[dims[0]].as_const() {
                Some(Scalar::Long(idx)) => {
                    if *idx < 1 || *idx > last_axis as i64 {
                        return Err(ParseError::syntax(
                            format!("vector index {} out of range 1..{}", idx, last_axis),
                            pos,
                        ));
                    }
                }
                _ => {
                    return Err(ParseError::syntax(
                        "axis-reducing subscript must be a constant",
                        pos,
                    ));
                }
            }
            Ok(self.push(Node {
                kind: NodeKind::Deref(var, SmallVec::from_vec(dims)),
                dtype: vkind,
                shape: vshape.reduced(),
            }))
        }
    }

    /// Insert a cast so `id` has kind `target`; constants fold in place
    pub(crate) fn promote_to(
        &mut self,
        id: NodeId,
        target: ValueKind,
        pos: Position,
    ) -> Result<NodeId, ParseError> {
        let kind = self.nodes[id].dtype;
        if kind == target {
            return Ok(id);
        }
        match target {
            ValueKind::Long => self.new_unary(UnaryOp::CastLong, id, pos),
            ValueKind::Double => self.new_unary(UnaryOp::CastDouble, id, pos),
            _ => Err(self.type_err(format!("cannot promote {} to {}", kind, target), pos)),
        }
    }

    /// Promote a numeric operand to Double
    fn promote_to_double(&mut self, id: NodeId, pos: Position) -> Result<NodeId, ParseError> {
        let kind = self.nodes[id].dtype;
        if !kind.is_numeric() {
            return Err(self.type_err(format!("expected a numeric operand, got {}", kind), pos));
        }
        self.promote_to(id, ValueKind::Double, pos)
    }

    /// True iff one operand is scalar or both have identical type and axes
    pub(crate) fn test_dims(&self, a: NodeId, b: NodeId) -> bool {
        let (na, nb) = (&self.nodes[a], &self.nodes[b]);
        na.shape.is_scalar()
            || nb.shape.is_scalar()
            || (na.dtype == nb.dtype && na.shape == nb.shape)
    }

    /// Overwrite node `id` with a folded constant and return it
    fn fold_into(&mut self, id: NodeId, value: Scalar) -> NodeId {
        let dtype = value.kind();
        let shape = match &value {
            Scalar::Bits(s) => Shape::vector(s.len()),
            _ => Shape::scalar(),
        };
        self.nodes[id] = Node {
            kind: NodeKind::Const(value),
            dtype,
            shape,
        };
        id
    }

    fn type_err(&self, message: impl Into<String>, pos: Position) -> ParseError {
        ParseError::new(ParseErrorKind::TypeMismatch, message, pos)
    }

    /// Finish the build: drop nodes unreachable from the root and remap
    ///
    /// Folding leaves consumed operand nodes behind; compaction restores
    /// the invariant that a literal-only expression is a single constant
    /// node.
    pub(crate) fn finish(self, root: NodeId, source: String) -> CompiledExpr {
        let mut keep = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if keep[id] {
                continue;
            }
            keep[id] = true;
            match &self.nodes[id].kind {
                NodeKind::Unary(_, c) => stack.push(*c),
                NodeKind::Binary(_, a, b) => {
                    stack.push(*a);
                    stack.push(*b);
                }
                NodeKind::Func(_, args) => stack.extend(args.iter().copied()),
                NodeKind::Deref(var, dims) => {
                    stack.push(*var);
                    stack.extend(dims.iter().copied());
                }
                _ => {}
            }
        }

        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut nodes = Vec::with_capacity(keep.iter().filter(|&&k| k).count());
        for (id, node) in self.nodes.into_iter().enumerate() {
            if keep[id] {
                remap[id] = nodes.len();
                nodes.push(node);
            }
        }
        for node in &mut nodes {
            match &mut node.kind {
                NodeKind::Unary(_, c) => *c = remap[*c],
                NodeKind::Binary(_, a, b) => {
                    *a = remap[*a];
                    *b = remap[*b];
                }
                NodeKind::Func(_, args) => {
                    for arg in args.iter_mut() {
                        *arg = remap[*arg];
                    }
                }
                NodeKind::Deref(var, dims) => {
                    *var = remap[*var];
                    for dim in dims.iter_mut() {
                        *dim = remap[*dim];
                    }
                }
                _ => {}
            }
        }

        CompiledExpr::from_parts(nodes, remap[root], self.config, source)
    }
}

/// Fold a unary operator over a constant
fn fold_unary(op: UnaryOp, value: &Scalar) -> Scalar {
    match (op, value) {
        (UnaryOp::Neg, Scalar::Long(v)) => Scalar::Long(-v),
        (UnaryOp::Neg, Scalar::Double(v)) => Scalar::Double(-v),
        (UnaryOp::Not, Scalar::Bool(b)) => Scalar::Bool(!b),
        (UnaryOp::BitNot, Scalar::Bits(s)) => Scalar::Bits(bits::bits_not(s)),
        (UnaryOp::CastLong, Scalar::Bool(b)) => Scalar::Long(i64::from(*b)),
        (UnaryOp::CastLong, Scalar::Double(v)) => Scalar::Long(*v as i64),
        (UnaryOp::CastLong, Scalar::Long(v)) => Scalar::Long(*v),
        (UnaryOp::CastDouble, Scalar::Bool(b)) => Scalar::Double(if *b { 1.0 } else { 0.0 }),
        (UnaryOp::CastDouble, Scalar::Long(v)) => Scalar::Double(*v as f64),
        (UnaryOp::CastDouble, Scalar::Double(v)) => Scalar::Double(*v),
        // Operand kinds were checked before folding
        (op, value) => unreachable!("fold_unary {op} on {value}"),
    }
}

/// Fold a binary operator over two equal-kind constants
fn fold_binary(op: BinaryOp, a: &Scalar, b: &Scalar, pos: Position) -> Result<Scalar, ParseError> {
    let div_zero = || ParseError::syntax("division by zero in constant expression", pos);
    Ok(match (a, b) {
        (Scalar::Long(x), Scalar::Long(y)) => match op {
            BinaryOp::Add => Scalar::Long(x.wrapping_add(*y)),
            BinaryOp::Sub => Scalar::Long(x.wrapping_sub(*y)),
            BinaryOp::Mul => Scalar::Long(x.wrapping_mul(*y)),
            BinaryOp::Div => {
                if *y == 0 {
                    return Err(div_zero());
                }
                Scalar::Long(x.wrapping_div(*y))
            }
            BinaryOp::Mod => {
                if *y == 0 {
                    return Err(div_zero());
                }
                Scalar::Long(x.wrapping_rem(*y))
            }
            BinaryOp::Pow => Scalar::Long((*x as f64).powf(*y as f64) as i64),
            BinaryOp::Eq => Scalar::Bool(x == y),
            BinaryOp::Ne => Scalar::Bool(x != y),
            BinaryOp::Lt => Scalar::Bool(x < y),
            BinaryOp::Le => Scalar::Bool(x <= y),
            BinaryOp::Gt => Scalar::Bool(x > y),
            BinaryOp::Ge => Scalar::Bool(x >= y),
            BinaryOp::BitAnd => Scalar::Long(x & y),
            BinaryOp::BitOr => Scalar::Long(x | y),
            BinaryOp::And | BinaryOp::Or => {
                unreachable!("logical operator folded over integers")
            }
        },
        (Scalar::Double(x), Scalar::Double(y)) => match op {
            BinaryOp::Add => Scalar::Double(x + y),
            BinaryOp::Sub => Scalar::Double(x - y),
            BinaryOp::Mul => Scalar::Double(x * y),
            BinaryOp::Div => {
                if *y == 0.0 {
                    return Err(div_zero());
                }
                Scalar::Double(x / y)
            }
            BinaryOp::Mod => {
                if *y == 0.0 {
                    return Err(div_zero());
                }
                Scalar::Double(x - y * (x / y).trunc())
            }
            BinaryOp::Pow => Scalar::Double(x.powf(*y)),
            BinaryOp::Eq => Scalar::Bool(x == y),
            BinaryOp::Ne => Scalar::Bool(x != y),
            BinaryOp::Lt => Scalar::Bool(x < y),
            BinaryOp::Le => Scalar::Bool(x <= y),
            BinaryOp::Gt => Scalar::Bool(x > y),
            BinaryOp::Ge => Scalar::Bool(x >= y),
            _ => unreachable!("operator {op} folded over doubles"),
        },
        (Scalar::Bool(x), Scalar::Bool(y)) => match op {
            BinaryOp::And => Scalar::Bool(*x && *y),
            BinaryOp::Or => Scalar::Bool(*x || *y),
            BinaryOp::Eq => Scalar::Bool(x == y),
            BinaryOp::Ne => Scalar::Bool(x != y),
            _ => unreachable!("operator {op} folded over booleans"),
        },
        _ => unreachable!("fold_binary on mixed constants"),
    })
}

/// Fold a comparison over two constant strings
fn fold_string_compare(op: BinaryOp, a: &str, b: &str) -> Scalar {
    Scalar::Bool(match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => unreachable!("operator {op} folded over strings"),
    })
}

/// Fold a bit-string operator over two constants
fn fold_bits_binary(op: BinaryOp, a: &str, b: &str) -> Scalar {
    match op {
        BinaryOp::Add => Scalar::Bits(bits::bits_concat(a, b)),
        BinaryOp::BitAnd => Scalar::Bits(bits::bits_and(a, b)),
        BinaryOp::BitOr => Scalar::Bits(bits::bits_or(a, b)),
        BinaryOp::Eq => Scalar::Bool(bits::bits_eq(a, b)),
        BinaryOp::Ne => Scalar::Bool(!bits::bits_eq(a, b)),
        BinaryOp::Lt => Scalar::Bool(bits::bits_to_long(a) < bits::bits_to_long(b)),
        BinaryOp::Le => Scalar::Bool(bits::bits_to_long(a) <= bits::bits_to_long(b)),
        BinaryOp::Gt => Scalar::Bool(bits::bits_to_long(a) > bits::bits_to_long(b)),
        BinaryOp::Ge => Scalar::Bool(bits::bits_to_long(a) >= bits::bits_to_long(b)),
        _ => unreachable!("operator {op} folded over bit strings"),
    }
}
