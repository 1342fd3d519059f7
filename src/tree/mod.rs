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

//! Compiled expression tree
//!
//! All nodes live in a single growable arena ([`CompiledExpr`]) and refer
//! to their children by integer index, so the arena can be resized during
//! parse and cloned cheaply afterwards. A node never references an
//! ancestor; ownership is a tree threaded through the arena.
//!
//! Nodes are created only while parsing (see [`build::TreeBuilder`]) and
//! destroyed only when the whole expression is dropped.

pub mod build;

use smallvec::SmallVec;
use std::fmt;

use crate::core::{EngineConfig, Scalar, Shape, ValueKind};
use crate::functions::FuncOp;

/// Index of a node in the arena
pub type NodeId = usize;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Logical NOT
    Not,
    /// Bit-string complement; flips 0 and 1, leaves 'x'
    BitNot,
    /// `(int)` cast, truncating toward zero
    CastLong,
    /// `(float)` cast
    CastDouble,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::BitNot => write!(f, "~"),
            UnaryOp::CastLong => write!(f, "(int)"),
            UnaryOp::CastDouble => write!(f, "(float)"),
        }
    }
}

/// Binary operators
///
/// `BitAnd`/`BitOr` are the `&`/`|` spellings: logical on booleans,
/// 64-bit bitwise on integers, positionwise on bit strings. `And`/`Or`
/// are the boolean-only `&&`/`||` spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition; concatenation on bit strings
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division (integer division on Long)
    Div,
    /// Modulus; on doubles `a - b * trunc(a / b)`
    Mod,
    /// Exponentiation, right-associative
    Pow,
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Logical AND
    And,
    /// Logical OR; defined-true dominates an undefined side
    Or,
    /// `&`: logical / bitwise / positionwise AND
    BitAnd,
    /// `|`: logical / bitwise / positionwise OR
    BitOr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        };
        write!(f, "{}", s)
    }
}

/// The operation a node performs
///
/// One variant per role: the source engine's triple-encoded integer
/// opcode becomes a sum type.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Literal constant, folded at parse time
    Const(Scalar),
    /// Reference to catalog column by index
    Column(usize),
    /// The running row number (`#ROW`)
    RowNum,
    /// Unary operator
    Unary(UnaryOp, NodeId),
    /// Binary operator
    Binary(BinaryOp, NodeId, NodeId),
    /// Built-in function call
    Func(FuncOp, SmallVec<[NodeId; 7]>),
    /// Vector dereference: `var` followed by 1-based subscripts
    Deref(NodeId, SmallVec<[NodeId; 5]>),
}

/// One vertex of the compiled expression tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// What the node computes
    pub kind: NodeKind,
    /// Static value kind of the result
    pub dtype: ValueKind,
    /// Static shape of the result
    pub shape: Shape,
}

impl Node {
    /// Returns true for constant nodes
    pub fn is_const(&self) -> bool {
        matches!(self.kind, NodeKind::Const(_))
    }

    /// The scalar payload, if this is a constant node
    pub fn as_const(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Const(s) => Some(s),
            _ => None,
        }
    }
}

/// A parsed, type-checked, constant-folded expression
///
/// Immutable after parse. Cloning copies the arena (integer indices
/// only), so worker threads can each take their own copy.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    nodes: Vec<Node>,
    root: NodeId,
    config: EngineConfig,
    source: String,
}

impl CompiledExpr {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        root: NodeId,
        config: EngineConfig,
        source: String,
    ) -> Self {
        Self {
            nodes,
            root,
            config,
            source,
        }
    }

    /// The root node index
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node by index
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the arena holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Value kind of the expression result
    pub fn result_kind(&self) -> ValueKind {
        self.nodes[self.root].dtype
    }

    /// Shape of the expression result
    pub fn result_shape(&self) -> Shape {
        self.nodes[self.root].shape
    }

    /// Returns true when the whole expression folded to a constant
    pub fn is_constant(&self) -> bool {
        self.nodes[self.root].is_const()
    }

    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Engine limits the expression was parsed under
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Column indices referenced by the tree, ascending and deduplicated
    pub fn referenced_columns(&self) -> Vec<usize> {
        let mut cols: Vec<usize> = self
            .nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Column(idx) => Some(idx),
                _ => None,
            })
            .collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_const_accessors() {
        let node = Node {
            kind: NodeKind::Const(Scalar::Long(3)),
            dtype: ValueKind::Long,
            shape: Shape::scalar(),
        };
        assert!(node.is_const());
        assert_eq!(node.as_const(), Some(&Scalar::Long(3)));

        let col = Node {
            kind: NodeKind::Column(0),
            dtype: ValueKind::Double,
            shape: Shape::scalar(),
        };
        assert!(!col.is_const());
        assert_eq!(col.as_const(), None);
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(BinaryOp::Pow.to_string(), "**");
        assert_eq!(BinaryOp::BitAnd.to_string(), "&");
        assert_eq!(UnaryOp::CastLong.to_string(), "(int)");
    }
}
