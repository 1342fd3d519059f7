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

//! Histogram binning specification parser
//!
//! A binning specification names up to four histogram axes and an
//! optional weight:
//!
//! ```text
//! axis[, axis[, axis[, axis]]] [; weight]
//! ```
//!
//! Each axis is `[name][=[lo]:[hi][:size]]` — any of the three numbers
//! may be omitted to be taken from column metadata — or the short form
//! `name=size`. The weight clause is an expression for the row weight;
//! a leading or trailing `/` marks the weight as reciprocal, and the
//! flag is carried through to the histogram collaborator.

use std::fmt;

use crate::parser::error::ParseError;
use crate::parser::token::Position;

/// Maximum number of histogram axes
pub const MAX_BIN_AXES: usize = 4;

/// One histogram axis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinAxis {
    /// Column or expression name; None = take the default axis column
    pub column: Option<String>,
    /// Lower bound; None = take from column metadata
    pub lo: Option<f64>,
    /// Upper bound; None = take from column metadata
    pub hi: Option<f64>,
    /// Bin size; None = take from column metadata
    pub size: Option<f64>,
}

/// Row weighting for the histogram
#[derive(Debug, Clone, PartialEq)]
pub struct BinWeight {
    /// Weight expression text, to be compiled against the same catalog
    pub expr: String,
    /// Weight each row by the reciprocal of the expression
    pub recip: bool,
}

/// A parsed binning specification
#[derive(Debug, Clone, PartialEq)]
pub struct BinSpec {
    /// Histogram axes, 1 to [`MAX_BIN_AXES`]
    pub axes: Vec<BinAxis>,
    /// Optional row weight
    pub weight: Option<BinWeight>,
}

impl fmt::Display for BinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, axis) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(name) = &axis.column {
                write!(f, "{}", name)?;
            }
            if axis.lo.is_some() || axis.hi.is_some() || axis.size.is_some() {
                write!(f, "=")?;
                if let Some(lo) = axis.lo {
                    write!(f, "{}", lo)?;
                }
                write!(f, ":")?;
                if let Some(hi) = axis.hi {
                    write!(f, "{}", hi)?;
                }
                if let Some(size) = axis.size {
                    write!(f, ":{}", size)?;
                }
            }
        }
        if let Some(weight) = &self.weight {
            write!(f, "; ")?;
            if weight.recip {
                write!(f, "/")?;
            }
            write!(f, "{}", weight.expr)?;
        }
        Ok(())
    }
}

/// Parse a binning specification
pub fn parse_binspec(input: &str) -> Result<BinSpec, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(err("empty binning specification", 0));
    }

    let (axes_part, weight_part) = match trimmed.find(';') {
        Some(split) => (&trimmed[..split], Some(&trimmed[split + 1..])),
        None => (trimmed, None),
    };

    let mut axes = Vec::new();
    let mut offset = 0usize;
    for part in axes_part.split(',') {
        if axes.len() == MAX_BIN_AXES {
            return Err(err(
                format!("more than {} binning axes", MAX_BIN_AXES),
                offset,
            ));
        }
        axes.push(parse_axis(part, offset)?);
        offset += part.len() + 1;
    }

    let weight = match weight_part {
        Some(raw) => Some(parse_weight(raw, axes_part.len() + 1)?),
        None => None,
    };

    Ok(BinSpec { axes, weight })
}

/// Parse one `[name][=[lo]:[hi][:size]]` axis spec
fn parse_axis(raw: &str, offset: usize) -> Result<BinAxis, ParseError> {
    let spec = raw.trim();
    if spec.is_empty() {
        return Err(err("empty binning axis", offset));
    }

    let (name_part, range_part) = match spec.find('=') {
        Some(split) => (&spec[..split], Some(&spec[split + 1..])),
        None => (spec, None),
    };

    let name = name_part.trim();
    let column = if name.is_empty() {
        None
    } else {
        if !is_column_name(name) {
            return Err(err(format!("invalid axis column name '{}'", name), offset));
        }
        Some(name.to_string())
    };

    let mut axis = BinAxis {
        column,
        ..BinAxis::default()
    };

    if let Some(range) = range_part {
        let range = range.trim();
        let pieces: Vec<&str> = range.split(':').collect();
        match pieces.len() {
            // 'name=size' short form
            1 => axis.size = parse_number(pieces[0], offset)?,
            2 => {
                axis.lo = parse_number(pieces[0], offset)?;
                axis.hi = parse_number(pieces[1], offset)?;
            }
            3 => {
                axis.lo = parse_number(pieces[0], offset)?;
                axis.hi = parse_number(pieces[1], offset)?;
                axis.size = parse_number(pieces[2], offset)?;
            }
            _ => return Err(err("too many ':' in binning range", offset)),
        }
        if let (Some(lo), Some(hi)) = (axis.lo, axis.hi) {
            if lo > hi {
                return Err(err(
                    format!("binning range {}:{} is inverted", lo, hi),
                    offset,
                ));
            }
        }
    }

    Ok(axis)
}

/// Parse the weight clause; a leading or trailing '/' means reciprocal
fn parse_weight(raw: &str, offset: usize) -> Result<BinWeight, ParseError> {
    let spec = raw.trim();
    let (expr, recip) = if let Some(rest) = spec.strip_prefix('/') {
        (rest.trim(), true)
    } else if let Some(rest) = spec.strip_suffix('/') {
        (rest.trim(), true)
    } else {
        (spec, false)
    };

    if expr.is_empty() {
        return Err(err("empty weight expression", offset));
    }

    Ok(BinWeight {
        expr: expr.to_string(),
        recip,
    })
}

/// Parse an optional number slot; empty means "take the default"
fn parse_number(raw: &str, offset: usize) -> Result<Option<f64>, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| err(format!("invalid number '{}'", trimmed), offset))
}

fn is_column_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '#' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn err(message: impl Into<String>, offset: usize) -> ParseError {
    ParseError::syntax(message, Position::new(offset, 1, offset + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_axis_full_range() {
        let spec = parse_binspec("X=1:10:0.5").unwrap();
        assert_eq!(spec.axes.len(), 1);
        let axis = &spec.axes[0];
        assert_eq!(axis.column.as_deref(), Some("X"));
        assert_eq!(axis.lo, Some(1.0));
        assert_eq!(axis.hi, Some(10.0));
        assert_eq!(axis.size, Some(0.5));
        assert!(spec.weight.is_none());
    }

    #[test]
    fn test_bare_column() {
        let spec = parse_binspec("ENERGY").unwrap();
        let axis = &spec.axes[0];
        assert_eq!(axis.column.as_deref(), Some("ENERGY"));
        assert_eq!(axis.lo, None);
        assert_eq!(axis.hi, None);
        assert_eq!(axis.size, None);
    }

    #[test]
    fn test_size_short_form() {
        let spec = parse_binspec("X=4").unwrap();
        let axis = &spec.axes[0];
        assert_eq!(axis.size, Some(4.0));
        assert_eq!(axis.lo, None);
    }

    #[test]
    fn test_omitted_slots() {
        let spec = parse_binspec("X=:100:2").unwrap();
        let axis = &spec.axes[0];
        assert_eq!(axis.lo, None);
        assert_eq!(axis.hi, Some(100.0));
        assert_eq!(axis.size, Some(2.0));

        let spec = parse_binspec("X=1:").unwrap();
        assert_eq!(spec.axes[0].lo, Some(1.0));
        assert_eq!(spec.axes[0].hi, None);
    }

    #[test]
    fn test_two_axes() {
        let spec = parse_binspec("X=0:10, Y=0:20:1").unwrap();
        assert_eq!(spec.axes.len(), 2);
        assert_eq!(spec.axes[1].column.as_deref(), Some("Y"));
        assert_eq!(spec.axes[1].size, Some(1.0));
    }

    #[test]
    fn test_weight_plain() {
        let spec = parse_binspec("X=1:10; FLUX * 2").unwrap();
        let weight = spec.weight.unwrap();
        assert_eq!(weight.expr, "FLUX * 2");
        assert!(!weight.recip);
    }

    #[test]
    fn test_weight_reciprocal_leading() {
        let spec = parse_binspec("X; /EXPOSURE").unwrap();
        let weight = spec.weight.unwrap();
        assert_eq!(weight.expr, "EXPOSURE");
        assert!(weight.recip);
    }

    #[test]
    fn test_weight_reciprocal_trailing() {
        let spec = parse_binspec("X; EXPOSURE/").unwrap();
        let weight = spec.weight.unwrap();
        assert_eq!(weight.expr, "EXPOSURE");
        assert!(weight.recip);
    }

    #[test]
    fn test_too_many_axes() {
        assert!(parse_binspec("A,B,C,D,E").is_err());
    }

    #[test]
    fn test_empty_pieces_rejected() {
        assert!(parse_binspec("").is_err());
        assert!(parse_binspec("X,,Y").is_err());
        assert!(parse_binspec("X;").is_err());
        assert!(parse_binspec("X; /").is_err());
    }

    #[test]
    fn test_bad_number() {
        assert!(parse_binspec("X=a:10").is_err());
    }

    #[test]
    fn test_inverted_range() {
        assert!(parse_binspec("X=10:1").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let spec = parse_binspec("X=1:10:0.5; /EXPOSURE").unwrap();
        let shown = spec.to_string();
        let again = parse_binspec(&shown).unwrap();
        assert_eq!(spec, again);
    }
}
