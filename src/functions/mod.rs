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

//! Built-in function set
//!
//! The engine supports a fixed, closed set of functions. Names are
//! matched case-insensitively; any other identifier followed by `(` is
//! rejected at parse time. Each opcode carries a fixed arity.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::LazyLock;

/// Opcode for a built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncOp {
    /// Per-row sum over a vector's elements
    Sum,
    /// Compile-time element count of a vector
    Nelem,
    /// Absolute value
    Abs,
    /// Sine (radians)
    Sin,
    /// Cosine (radians)
    Cos,
    /// Tangent (radians)
    Tan,
    /// Inverse sine
    ArcSin,
    /// Inverse cosine
    ArcCos,
    /// Inverse tangent
    ArcTan,
    /// Two-argument inverse tangent
    ArcTan2,
    /// Exponential
    Exp,
    /// Natural logarithm
    Log,
    /// Base-10 logarithm
    Log10,
    /// Square root
    Sqrt,
    /// Uniform random double in [0, 1)
    Random,
    /// Test for undefined elements
    IsNull,
    /// Replace undefined elements with a fallback
    DefNull,
    /// Closeness test `|x - y| < tol`
    Near,
    /// Point-in-disc test
    Circle,
    /// Point-in-rotated-rectangle test
    Box,
    /// Point-in-rotated-ellipse test
    Ellipse,
}

/// Canonical function names, uppercase
static FUNC_NAMES: &[(&str, FuncOp)] = &[
    ("SUM", FuncOp::Sum),
    ("NELEM", FuncOp::Nelem),
    ("ABS", FuncOp::Abs),
    ("SIN", FuncOp::Sin),
    ("COS", FuncOp::Cos),
    ("TAN", FuncOp::Tan),
    ("ARCSIN", FuncOp::ArcSin),
    ("ARCCOS", FuncOp::ArcCos),
    ("ARCTAN", FuncOp::ArcTan),
    ("ARCTAN2", FuncOp::ArcTan2),
    ("EXP", FuncOp::Exp),
    ("LOG", FuncOp::Log),
    ("LOG10", FuncOp::Log10),
    ("SQRT", FuncOp::Sqrt),
    ("RANDOM", FuncOp::Random),
    ("ISNULL", FuncOp::IsNull),
    ("DEFNULL", FuncOp::DefNull),
    ("NEAR", FuncOp::Near),
    ("CIRCLE", FuncOp::Circle),
    ("BOX", FuncOp::Box),
    ("ELLIPSE", FuncOp::Ellipse),
];

/// Compiled name table for O(1) case-insensitive lookups
static FUNC_TABLE: LazyLock<FxHashMap<&'static str, FuncOp>> = LazyLock::new(|| {
    let mut map = FxHashMap::with_capacity_and_hasher(FUNC_NAMES.len(), Default::default());
    for (name, op) in FUNC_NAMES {
        map.insert(*name, *op);
    }
    map
});

impl FuncOp {
    /// Resolve a function name, case-insensitively
    pub fn lookup(name: &str) -> Option<FuncOp> {
        if let Some(op) = FUNC_TABLE.get(name) {
            return Some(*op);
        }
        let upper = name.to_ascii_uppercase();
        FUNC_TABLE.get(upper.as_str()).copied()
    }

    /// The canonical (uppercase) name of this function
    pub fn name(&self) -> &'static str {
        match self {
            FuncOp::Sum => "SUM",
            FuncOp::Nelem => "NELEM",
            FuncOp::Abs => "ABS",
            FuncOp::Sin => "SIN",
            FuncOp::Cos => "COS",
            FuncOp::Tan => "TAN",
            FuncOp::ArcSin => "ARCSIN",
            FuncOp::ArcCos => "ARCCOS",
            FuncOp::ArcTan => "ARCTAN",
            FuncOp::ArcTan2 => "ARCTAN2",
            FuncOp::Exp => "EXP",
            FuncOp::Log => "LOG",
            FuncOp::Log10 => "LOG10",
            FuncOp::Sqrt => "SQRT",
            FuncOp::Random => "RANDOM",
            FuncOp::IsNull => "ISNULL",
            FuncOp::DefNull => "DEFNULL",
            FuncOp::Near => "NEAR",
            FuncOp::Circle => "CIRCLE",
            FuncOp::Box => "BOX",
            FuncOp::Ellipse => "ELLIPSE",
        }
    }

    /// Fixed argument count for this function
    pub fn arity(&self) -> usize {
        match self {
            FuncOp::Random => 0,
            FuncOp::Sum
            | FuncOp::Nelem
            | FuncOp::Abs
            | FuncOp::Sin
            | FuncOp::Cos
            | FuncOp::Tan
            | FuncOp::ArcSin
            | FuncOp::ArcCos
            | FuncOp::ArcTan
            | FuncOp::Exp
            | FuncOp::Log
            | FuncOp::Log10
            | FuncOp::Sqrt
            | FuncOp::IsNull => 1,
            FuncOp::ArcTan2 | FuncOp::DefNull => 2,
            FuncOp::Near => 3,
            FuncOp::Circle => 5,
            FuncOp::Box | FuncOp::Ellipse => 7,
        }
    }

    /// Returns true for the one-argument math functions that take a
    /// Double operand and yield a Double
    pub fn is_unary_math(&self) -> bool {
        matches!(
            self,
            FuncOp::Sin
                | FuncOp::Cos
                | FuncOp::Tan
                | FuncOp::ArcSin
                | FuncOp::ArcCos
                | FuncOp::ArcTan
                | FuncOp::Exp
                | FuncOp::Log
                | FuncOp::Log10
                | FuncOp::Sqrt
        )
    }

    /// Returns true for the 2-D region predicates whose arguments must
    /// all be per-row scalars
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            FuncOp::Near | FuncOp::Circle | FuncOp::Box | FuncOp::Ellipse
        )
    }
}

impl fmt::Display for FuncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
