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

//! Core types and definitions for rowexpr
//!
//! This module contains the fundamental types used throughout the engine:
//!
//! - [`ValueKind`] - the five value kinds and the numeric promotion lattice
//! - [`Shape`] - per-row element count and axis layout
//! - [`ColInfo`] - column metadata
//! - [`Scalar`] / [`ArrayValue`] - constant and vector runtime values
//! - [`ColumnCatalog`] / [`RowBatch`] - host-supplied table access
//! - [`Error`] - evaluation and binding error types

pub mod catalog;
pub mod error;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use catalog::{
    ColumnCatalog, ColumnData, DefaultRandom, EngineConfig, MessageSink, NullSink, RandomSource,
    RowBatch, TableCatalog, VecSink,
};
pub use error::{Error, Result};
pub use types::{ColInfo, Shape, ValueKind, MAX_DIMS};
pub use value::{ArrayValue, Buffer, Scalar};
