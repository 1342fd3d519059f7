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

//! Operator precedence levels for the Pratt parser

/// Precedence levels (higher number = higher precedence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[derive(Default)]
pub enum Precedence {
    /// Lowest precedence
    #[default]
    Lowest = 1,
    /// Range syntax (`=`, `:`)
    Range = 2,
    /// Logical OR (`||`, `OR`)
    Or = 3,
    /// Logical AND (`&&`, `AND`)
    And = 4,
    /// Equality (`==`, `!=`)
    Equality = 5,
    /// Relational (`<`, `<=`, `>`, `>=`)
    Relational = 6,
    /// Addition, subtraction, modulus (`+`, `-`, `%`)
    Sum = 7,
    /// Multiplication and division (`*`, `/`)
    Product = 8,
    /// Bit / set operators (`|`, `&`)
    BitSet = 9,
    /// Exponentiation (`**`, `^`), right-associative
    Power = 10,
    /// Prefix operators (`!`, `NOT`, `~`, unary `-`, casts)
    Prefix = 11,
    /// Subscript (`[`)
    Index = 12,
}

impl Precedence {
    /// Get precedence for an operator spelling
    pub fn for_operator(op: &str) -> Precedence {
        match op {
            "=" | ":" => Precedence::Range,
            "||" => Precedence::Or,
            "&&" => Precedence::And,
            "==" | "!=" => Precedence::Equality,
            "<" | "<=" | ">" | ">=" => Precedence::Relational,
            "+" | "-" | "%" => Precedence::Sum,
            "*" | "/" => Precedence::Product,
            "|" | "&" => Precedence::BitSet,
            "**" | "^" => Precedence::Power,
            "[" => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Product > Precedence::Sum);
        assert!(Precedence::Sum > Precedence::Relational);
        assert!(Precedence::Relational > Precedence::Equality);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::BitSet > Precedence::Product);
        assert!(Precedence::Power > Precedence::BitSet);
        assert!(Precedence::Index > Precedence::Prefix);
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(Precedence::for_operator("+"), Precedence::Sum);
        assert_eq!(Precedence::for_operator("%"), Precedence::Sum);
        assert_eq!(Precedence::for_operator("*"), Precedence::Product);
        assert_eq!(Precedence::for_operator("&&"), Precedence::And);
        assert_eq!(Precedence::for_operator("||"), Precedence::Or);
        assert_eq!(Precedence::for_operator("**"), Precedence::Power);
        assert_eq!(Precedence::for_operator("^"), Precedence::Power);
        assert_eq!(Precedence::for_operator("="), Precedence::Range);
        assert_eq!(Precedence::for_operator("["), Precedence::Index);
    }
}
