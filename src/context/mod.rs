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

//! Compilation-scoped services and memoized well-known declarations.
//!
//! A [`DiffContext`] is created once per translation unit and shared by
//! reference across every differentiation request on that unit. Library
//! handles (the namespace, `tape`, `array_ref`, `push`/`pop`/`back`) are
//! resolved on first use and cached; the declarations they point at never
//! change for the lifetime of the unit.

use std::cell::OnceCell;

use crate::ast::{DeclId, DeclKind, TranslationUnit};
use crate::config::DiffOptions;
use crate::error::InternalError;
use crate::lookup::{lookup_qualified, OverloadResolver, SignatureResolver};
use crate::types::{StructuralOracle, Type, TypeOracle};

pub const FORWARD_CENTRAL_DIFFERENCE: &str = "forward_central_difference";
pub const CENTRAL_DIFFERENCE: &str = "central_difference";

#[derive(Debug, Default)]
struct LibraryDecls {
    namespace: OnceCell<DeclId>,
    tape: OnceCell<DeclId>,
    array_ref: OnceCell<DeclId>,
    array: OnceCell<DeclId>,
    push: OnceCell<DeclId>,
    pop: OnceCell<DeclId>,
    back: OnceCell<DeclId>,
}

pub struct DiffContext {
    options: DiffOptions,
    oracle: Box<dyn TypeOracle>,
    resolver: Box<dyn OverloadResolver>,
    library: LibraryDecls,
}

impl Default for DiffContext {
    fn default() -> Self {
        Self::new(DiffOptions::default())
    }
}

fn memo(
    cell: &OnceCell<DeclId>,
    resolve: impl FnOnce() -> Result<DeclId, InternalError>,
) -> Result<DeclId, InternalError> {
    if let Some(id) = cell.get() {
        return Ok(*id);
    }
    let id = resolve()?;
    let _ = cell.set(id);
    Ok(id)
}

impl DiffContext {
    pub fn new(options: DiffOptions) -> Self {
        Self {
            options,
            oracle: Box::new(StructuralOracle),
            resolver: Box::new(SignatureResolver),
            library: LibraryDecls::default(),
        }
    }

    pub fn with_oracle(mut self, oracle: impl TypeOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub fn with_resolver(mut self, resolver: impl OverloadResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub fn oracle(&self) -> &dyn TypeOracle {
        self.oracle.as_ref()
    }

    pub fn resolver(&self) -> &dyn OverloadResolver {
        self.resolver.as_ref()
    }

    pub fn library_namespace(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.namespace, || {
            let name = &self.options.library_namespace;
            unit.find_namespace(None, name)
                .ok_or_else(|| InternalError::MissingLibraryDecl(name.clone()))
        })
    }

    fn library_member(
        &self,
        unit: &TranslationUnit,
        name: &str,
        want_template: bool,
    ) -> Result<DeclId, InternalError> {
        self.library_namespace(unit)?;
        lookup_qualified(unit, &self.options.library_namespace, name)
            .into_iter()
            .find(|id| match unit.decl(*id).kind {
                DeclKind::ClassTemplate { .. } => want_template,
                DeclKind::Function(_) => !want_template,
                _ => false,
            })
            .ok_or_else(|| {
                InternalError::MissingLibraryDecl(format!("{}::{name}", self.options.library_namespace))
            })
    }

    pub fn tape_template(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.tape, || self.library_member(unit, "tape", true))
    }

    pub fn array_ref_template(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.array_ref, || self.library_member(unit, "array_ref", true))
    }

    pub fn array_template(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.array, || self.library_member(unit, "array", true))
    }

    pub fn tape_push(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.push, || self.library_member(unit, "push", false))
    }

    pub fn tape_pop(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.pop, || self.library_member(unit, "pop", false))
    }

    pub fn tape_back(&self, unit: &TranslationUnit) -> Result<DeclId, InternalError> {
        memo(&self.library.back, || self.library_member(unit, "back", false))
    }

    /// `library::Template<args...>`.
    pub fn class_of_type(&self, unit: &TranslationUnit, template: DeclId, args: Vec<Type>) -> Type {
        Type::Named {
            scope: vec![self.options.library_namespace.clone()],
            name: unit.name(template).to_string(),
            args,
        }
    }

    pub fn tape_of(&self, unit: &TranslationUnit, elem: Type) -> Result<Type, InternalError> {
        let template = self.tape_template(unit)?;
        Ok(self.class_of_type(unit, template, vec![elem]))
    }

    pub fn array_ref_of(&self, unit: &TranslationUnit, elem: Type) -> Result<Type, InternalError> {
        let template = self.array_ref_template(unit)?;
        Ok(self.class_of_type(unit, template, vec![elem]))
    }

    pub fn array_of(&self, unit: &TranslationUnit, elem: Type) -> Result<Type, InternalError> {
        let template = self.array_template(unit)?;
        Ok(self.class_of_type(unit, template, vec![elem]))
    }

    pub fn is_array_ref_type(&self, ty: &Type) -> bool {
        matches!(
            ty.non_reference(),
            Type::Named { scope, name, .. }
                if name == "array_ref" && scope.first() == Some(&self.options.library_namespace)
        )
    }
}

/// Declare the runtime library the synthesized code calls into.
pub fn install_runtime_library(unit: &mut TranslationUnit, options: &DiffOptions) -> DeclId {
    let ns = unit.declare_namespace(&options.library_namespace, false, None);
    for template in ["tape", "array_ref", "array"] {
        unit.declare_class_template(template, 1, Some(ns));
    }
    unit.declare_function(
        "push",
        &[("tape", Type::generic("Tape").reference()), ("value", Type::generic("T"))],
        Type::Void,
        Some(ns),
    );
    for accessor in ["pop", "back"] {
        unit.declare_function(
            accessor,
            &[("tape", Type::generic("Tape").reference())],
            Type::generic("T"),
            Some(ns),
        );
    }
    let forward = unit.declare_function(
        FORWARD_CENTRAL_DIFFERENCE,
        &[
            ("f", Type::generic("F")),
            ("arg", Type::generic("T")),
            ("arg_pos", Type::Int),
            ("print_error", Type::Int),
        ],
        Type::Double,
        Some(ns),
    );
    unit.set_variadic(forward, true);
    let multi = unit.declare_function(
        CENTRAL_DIFFERENCE,
        &[
            ("f", Type::generic("F")),
            ("grads", Type::generic("Tape").reference()),
            ("print_error", Type::Int),
        ],
        Type::Void,
        Some(ns),
    );
    unit.set_variadic(multi, true);
    log::debug!("installed runtime library namespace '{}'", options.library_namespace);
    ns
}
