// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Forward-mode derivative synthesis.
//!
//! [`differentiate_forward`] takes a function with a body, resolves the
//! independent variable from the differentiation-argument expression and
//! emits a new function `<name>_darg<N>` that returns the directional
//! derivative. Every original expression is mapped to an [`ExprDiff`] pair:
//! its copy in the new function and its tangent. Calls are derived through
//! a custom `_pushforward` overload when one is visible, then through the
//! symbolic rule table, and finally through the runtime central-difference
//! helpers.

mod forward;
mod rules;

pub use forward::{differentiate_forward, ExprDiff, ForwardResult, Independent};
