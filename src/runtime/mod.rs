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

//! Executable counterparts of the library the synthesized code calls into.
//!
//! Hosts that evaluate synthesized derivatives in-process link against
//! these; they also serve as the reference semantics for `tape<T>`,
//! `forward_central_difference` and `central_difference`.

pub mod numerical;
pub mod tape;

pub use numerical::{central_difference, forward_central_difference, step_size, NumDiffError};
pub use tape::Tape;
