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

//! Error types for rowexpr
//!
//! This module defines the evaluation-time error type. Parse-time errors
//! carry positions and live in [`crate::parser::error`].

use thiserror::Error;

/// Result type alias for rowexpr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for evaluation and batch binding
///
/// Evaluation errors are sticky per evaluator: once one is recorded,
/// subsequent evaluate calls short-circuit with a clone of it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Arithmetic errors
    // =========================================================================
    /// Division by zero on a defined element
    #[error("division by zero")]
    DivisionByZero,

    /// Out-of-domain argument to a math function
    #[error("domain error in {function}: {detail}")]
    DomainError { function: String, detail: String },

    // =========================================================================
    // Vector subscript errors
    // =========================================================================
    /// Null used as a vector subscript
    #[error("null encountered as vector index")]
    NullVectorIndex,

    /// Subscript outside the valid 1-based range of an axis
    #[error("vector index {index} out of range 1..{bound}")]
    IndexOutOfRange { index: i64, bound: usize },

    // =========================================================================
    // Binding errors
    // =========================================================================
    /// Referenced column has no data in the presented batch
    #[error("column {0} not present in batch")]
    ColumnNotBound(usize),

    /// Batch buffer does not match the column's declared type or length
    #[error("batch buffer mismatch for column {column}: {detail}")]
    BatchMismatch { column: usize, detail: String },

    // =========================================================================
    // Other errors
    // =========================================================================
    /// Operand kind disagrees with the compiled tree (engine bug)
    #[error("type error: {0}")]
    Type(String),

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new DomainError
    pub fn domain(function: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::DomainError {
            function: function.into(),
            detail: detail.into(),
        }
    }

    /// Create a new BatchMismatch error
    pub fn batch_mismatch(column: usize, detail: impl Into<String>) -> Self {
        Error::BatchMismatch {
            column,
            detail: detail.into(),
        }
    }

    /// Create a new Type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this error came from a per-element arithmetic fault
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Error::DivisionByZero | Error::DomainError { .. })
    }

    /// Check if this error came from batch binding
    pub fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Error::ColumnNotBound(_) | Error::BatchMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            Error::NullVectorIndex.to_string(),
            "null encountered as vector index"
        );
        assert_eq!(
            Error::IndexOutOfRange { index: 5, bound: 4 }.to_string(),
            "vector index 5 out of range 1..4"
        );
        assert_eq!(
            Error::domain("SQRT", "negative argument").to_string(),
            "domain error in SQRT: negative argument"
        );
        assert_eq!(
            Error::ColumnNotBound(3).to_string(),
            "column 3 not present in batch"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::DivisionByZero.is_arithmetic());
        assert!(Error::domain("LOG", "nonpositive argument").is_arithmetic());
        assert!(!Error::NullVectorIndex.is_arithmetic());

        assert!(Error::ColumnNotBound(0).is_bind_error());
        assert!(Error::batch_mismatch(1, "short buffer").is_bind_error());
        assert!(!Error::DivisionByZero.is_bind_error());
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(Error::DivisionByZero, Error::DivisionByZero);
        assert_ne!(
            Error::domain("SQRT", "negative argument"),
            Error::domain("LOG", "nonpositive argument")
        );
    }
}
