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

//! Batch binding and evaluation
//!
//! This module contains the runtime half of the engine:
//!
//! - [`BindCtx`] - per-batch column binding and undef mask reconstruction
//! - [`Evaluator`] - the tree-walking vectorized evaluator
//!
//! The compiled tree is immutable; each batch produces a fresh binding
//! and evaluation mutates nothing but its own output buffers. A compiled
//! expression is therefore not shared across threads; clone it per
//! worker instead.

pub mod bind;
pub(crate) mod bits;
pub mod evaluate;
mod funcs;

pub use bind::BindCtx;
pub use evaluate::Evaluator;
