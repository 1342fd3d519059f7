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

//! Runtime value representation
//!
//! Two forms exist: [`Scalar`] for constants folded into the tree, and
//! [`ArrayValue`] for per-batch vector results. An `ArrayValue` pairs a
//! tagged data buffer with a parallel byte mask where 1 marks an
//! undefined element. Bit strings carry no mask; their unknown positions
//! are the `'x'` characters in the stream.

use std::fmt;

use super::types::ValueKind;

/// A scalar constant payload
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean constant
    Bool(bool),
    /// 64-bit integer constant
    Long(i64),
    /// 64-bit float constant
    Double(f64),
    /// String constant
    Str(String),
    /// Bit-string constant over {'0','1','x'}
    Bits(String),
}

impl Scalar {
    /// The value kind of this scalar
    pub fn kind(&self) -> ValueKind {
        match self {
            Scalar::Bool(_) => ValueKind::Bool,
            Scalar::Long(_) => ValueKind::Long,
            Scalar::Double(_) => ValueKind::Double,
            Scalar::Str(_) => ValueKind::Str,
            Scalar::Bits(_) => ValueKind::Bits,
        }
    }

    /// Read as bool, if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as i64, if this is a Long
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Scalar::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Read as f64, widening Long and Bool
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Long(v) => Some(*v as f64),
            Scalar::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Read as &str, if this is a Str or Bits
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) | Scalar::Bits(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(true) => write!(f, "T"),
            Scalar::Bool(false) => write!(f, "F"),
            Scalar::Long(v) => write!(f, "{}", v),
            Scalar::Double(v) => write!(f, "{}", v),
            Scalar::Str(s) => write!(f, "'{}'", s),
            Scalar::Bits(s) => write!(f, "b'{}'", s),
        }
    }
}

/// Tagged contiguous data buffer for a vector value
///
/// Numeric and boolean buffers hold `nrows * nelem` elements in row-major
/// order (row's elements adjacent). String and bit-string buffers hold one
/// entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    /// Boolean elements
    Bool(Vec<bool>),
    /// 64-bit integer elements
    Long(Vec<i64>),
    /// 64-bit float elements
    Double(Vec<f64>),
    /// One string per row
    Str(Vec<String>),
    /// One bit string per row
    Bits(Vec<String>),
}

impl Buffer {
    /// The value kind stored in this buffer
    pub fn kind(&self) -> ValueKind {
        match self {
            Buffer::Bool(_) => ValueKind::Bool,
            Buffer::Long(_) => ValueKind::Long,
            Buffer::Double(_) => ValueKind::Double,
            Buffer::Str(_) => ValueKind::Str,
            Buffer::Bits(_) => ValueKind::Bits,
        }
    }

    /// Number of stored elements (rows for Str/Bits)
    pub fn len(&self) -> usize {
        match self {
            Buffer::Bool(v) => v.len(),
            Buffer::Long(v) => v.len(),
            Buffer::Double(v) => v.len(),
            Buffer::Str(v) => v.len(),
            Buffer::Bits(v) => v.len(),
        }
    }

    /// Returns true when the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A materialized per-batch result: data buffer plus undef mask
///
/// `undef` parallels the data buffer element for element; it is empty for
/// bit strings. `nelem` is the per-row element count (1 for scalars and
/// for all string results).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    /// Element data
    pub buf: Buffer,
    /// Per-element undef mask, 1 = undefined; empty for Bits
    pub undef: Vec<u8>,
    /// Elements per row
    pub nelem: usize,
}

impl ArrayValue {
    /// The value kind of this array
    pub fn kind(&self) -> ValueKind {
        self.buf.kind()
    }

    /// Number of rows covered by this array
    pub fn nrows(&self) -> usize {
        if self.nelem == 0 {
            return 0;
        }
        self.buf.len() / self.nelem
    }

    /// Returns true when every element is defined
    pub fn all_defined(&self) -> bool {
        self.undef.iter().all(|&u| u == 0)
    }

    /// Borrow boolean data, if this is a Bool array
    pub fn bools(&self) -> Option<&[bool]> {
        match &self.buf {
            Buffer::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow integer data, if this is a Long array
    pub fn longs(&self) -> Option<&[i64]> {
        match &self.buf {
            Buffer::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow float data, if this is a Double array
    pub fn doubles(&self) -> Option<&[f64]> {
        match &self.buf {
            Buffer::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow string data, if this is a Str or Bits array
    pub fn strings(&self) -> Option<&[String]> {
        match &self.buf {
            Buffer::Str(v) | Buffer::Bits(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind() {
        assert_eq!(Scalar::Bool(true).kind(), ValueKind::Bool);
        assert_eq!(Scalar::Long(1).kind(), ValueKind::Long);
        assert_eq!(Scalar::Double(1.5).kind(), ValueKind::Double);
        assert_eq!(Scalar::Str("a".into()).kind(), ValueKind::Str);
        assert_eq!(Scalar::Bits("10x".into()).kind(), ValueKind::Bits);
    }

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(Scalar::Long(7).as_long(), Some(7));
        assert_eq!(Scalar::Long(7).as_double(), Some(7.0));
        assert_eq!(Scalar::Bool(true).as_double(), Some(1.0));
        assert_eq!(Scalar::Double(2.5).as_long(), None);
        assert_eq!(Scalar::Str("hi".into()).as_str(), Some("hi"));
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Bool(true).to_string(), "T");
        assert_eq!(Scalar::Bool(false).to_string(), "F");
        assert_eq!(Scalar::Long(42).to_string(), "42");
        assert_eq!(Scalar::Str("hi".into()).to_string(), "'hi'");
        assert_eq!(Scalar::Bits("101".into()).to_string(), "b'101'");
    }

    #[test]
    fn test_array_value_rows() {
        let a = ArrayValue {
            buf: Buffer::Long(vec![1, 2, 3, 4, 5, 6]),
            undef: vec![0; 6],
            nelem: 3,
        };
        assert_eq!(a.nrows(), 2);
        assert_eq!(a.kind(), ValueKind::Long);
        assert!(a.all_defined());
        assert_eq!(a.longs(), Some(&[1i64, 2, 3, 4, 5, 6][..]));
        assert_eq!(a.doubles(), None);
    }

    #[test]
    fn test_array_value_undef() {
        let a = ArrayValue {
            buf: Buffer::Double(vec![1.0, 2.0]),
            undef: vec![0, 1],
            nelem: 1,
        };
        assert!(!a.all_defined());
    }
}
