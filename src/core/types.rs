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

//! Core type definitions for rowexpr
//!
//! This module defines the fundamental types: ValueKind, Shape, ColInfo.

use std::fmt;

/// Maximum number of axes a vector column may carry
pub const MAX_DIMS: usize = 5;

/// Value kinds supported by the expression engine
///
/// `Bool`, `Long` and `Double` form the numeric promotion lattice
/// `Bool < Long < Double`; mixed-kind arithmetic promotes both operands
/// to the higher kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// Boolean true/false
    Bool = 0,

    /// 64-bit signed integer
    Long = 1,

    /// 64-bit floating point number
    Double = 2,

    /// Character string of bounded width
    Str = 3,

    /// Bit string over the alphabet {'0', '1', 'x'}
    Bits = 4,
}

impl ValueKind {
    /// Returns true if this kind is in the numeric promotion lattice
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Bool | ValueKind::Long | ValueKind::Double)
    }

    /// Rank within the promotion lattice; None for non-numeric kinds
    pub fn rank(&self) -> Option<u8> {
        match self {
            ValueKind::Bool => Some(0),
            ValueKind::Long => Some(1),
            ValueKind::Double => Some(2),
            _ => None,
        }
    }

    /// The common kind two numeric operands promote to
    ///
    /// Returns None when either side is outside the lattice.
    pub fn promoted(a: ValueKind, b: ValueKind) -> Option<ValueKind> {
        let (ra, rb) = (a.rank()?, b.rank()?);
        Some(if ra >= rb { a } else { b })
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "BOOL"),
            ValueKind::Long => write!(f, "LONG"),
            ValueKind::Double => write!(f, "DOUBLE"),
            ValueKind::Str => write!(f, "STRING"),
            ValueKind::Bits => write!(f, "BITSTR"),
        }
    }
}

/// Per-row element count and axis layout of a value
///
/// Scalars are `nelem == 1, naxis == 1, naxes == [1, ...]`. A vector
/// column carries up to [`MAX_DIMS`] axes with the first axis varying
/// fastest; `nelem` is always the product of the first `naxis` axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    /// Total scalar count per row
    pub nelem: usize,
    /// Number of meaningful axes
    pub naxis: usize,
    /// Axis lengths; entries past `naxis` are 1
    pub naxes: [usize; MAX_DIMS],
}

impl Shape {
    /// The scalar shape
    pub fn scalar() -> Self {
        Self {
            nelem: 1,
            naxis: 1,
            naxes: [1; MAX_DIMS],
        }
    }

    /// A one-axis vector of length `n`
    pub fn vector(n: usize) -> Self {
        let mut naxes = [1; MAX_DIMS];
        naxes[0] = n;
        Self {
            nelem: n,
            naxis: 1,
            naxes,
        }
    }

    /// Build a shape from explicit axis lengths
    ///
    /// `axes` must hold between 1 and [`MAX_DIMS`] entries; `nelem` is
    /// derived as their product.
    pub fn from_axes(axes: &[usize]) -> Option<Self> {
        if axes.is_empty() || axes.len() > MAX_DIMS {
            return None;
        }
        let mut naxes = [1; MAX_DIMS];
        let mut nelem = 1usize;
        for (i, &n) in axes.iter().enumerate() {
            naxes[i] = n;
            nelem = nelem.checked_mul(n)?;
        }
        Some(Self {
            nelem,
            naxis: axes.len(),
            naxes,
        })
    }

    /// Returns true for the scalar shape
    pub fn is_scalar(&self) -> bool {
        self.nelem == 1
    }

    /// Drop the last axis, as a single-index dereference does
    pub fn reduced(&self) -> Self {
        if self.naxis <= 1 {
            return Shape::scalar();
        }
        let mut naxes = [1; MAX_DIMS];
        let mut nelem = 1usize;
        for i in 0..self.naxis - 1 {
            naxes[i] = self.naxes[i];
            nelem *= self.naxes[i];
        }
        Self {
            nelem,
            naxis: self.naxis - 1,
            naxes,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::scalar()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for i in 0..self.naxis {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", self.naxes[i])?;
        }
        write!(f, ")")
    }
}

/// Column metadata supplied by the host catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColInfo {
    /// Column name, matched case-insensitively by the parser
    pub name: String,
    /// Value kind of the column's elements
    pub kind: ValueKind,
    /// Per-row element count and axis layout
    pub shape: Shape,
}

impl ColInfo {
    /// Create a scalar column
    pub fn scalar(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: Shape::scalar(),
        }
    }

    /// Create a one-axis vector column
    pub fn vector(name: impl Into<String>, kind: ValueKind, nelem: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: Shape::vector(nelem),
        }
    }
}
