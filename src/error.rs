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

//! Failure results shared by the builders.
//!
//! Argument-list errors come from [`crate::params`]. Everything the engine
//! cannot recover from while synthesizing code ends up in [`DiffError`].
//! Unsupported constructs that have a fallback are warnings, never errors.

use crate::ast::DeclId;
use crate::params::ParamError;

/// Defects in the engine or its environment rather than in user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// A cloned subtree still refers to a declaration of the original
    /// function and no replacement was registered for it.
    #[error("reference to '{name}' ({decl:?}) has no mapping in the derivative function")]
    UnresolvedReference { decl: DeclId, name: String },
    /// A well-known runtime library declaration could not be found.
    #[error("cannot find '{0}' in the runtime library namespace")]
    MissingLibraryDecl(String),
    /// The declaration handed to the engine is not a function.
    #[error("declaration '{0}' is not a function")]
    NotAFunction(String),
}

/// Errors returned by a differentiation request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error("function '{0}' has no body to differentiate")]
    MissingBody(String),
    #[error("forward mode differentiation w.r.t. several parameters at once is not supported ({0} requested)")]
    MultipleIndependents(usize),
    #[error("cannot differentiate w.r.t. '{name}{selector}' of type '{ty}'")]
    UnsupportedParameter {
        name: String,
        selector: String,
        ty: String,
    },
    #[error("numerical differentiation of '{function}' is not possible: argument {position} has non-arithmetic type '{ty}'")]
    UnsupportedFallback {
        function: String,
        position: usize,
        ty: String,
    },
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl DiffError {
    pub fn is_internal(&self) -> bool {
        matches!(self, DiffError::Internal(_))
    }

    /// Diagnostic code for user-facing failures; internal errors have none.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            DiffError::Params(err) => Some(err.code()),
            DiffError::MissingBody(_) => Some("E2104"),
            DiffError::MultipleIndependents(_) => Some("E2102"),
            DiffError::UnsupportedParameter { .. } => Some("E2103"),
            DiffError::UnsupportedFallback { .. } => Some("E2101"),
            DiffError::Internal(_) => None,
        }
    }
}
