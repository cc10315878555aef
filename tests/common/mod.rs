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


#![allow(dead_code)]

use srcdiff::ast::{DeclId, ExprId, StmtId, TranslationUnit};
use srcdiff::types::Type;
use srcdiff::{
    differentiate_forward, install_runtime_library, DiffContext, DiffError, DiffOptions,
    Diagnostics, ForwardResult,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A translation unit with the runtime library and the usual math
/// functions declared.
pub fn unit_with_library(options: &DiffOptions) -> TranslationUnit {
    let mut unit = TranslationUnit::new();
    install_runtime_library(&mut unit, options);
    for name in ["sin", "cos", "exp", "log", "sqrt"] {
        unit.declare_function(name, &[("x", Type::Double)], Type::Double, None);
    }
    unit
}

/// Declare `name(params...)` at translation-unit scope and return it with
/// its parameter declarations.
pub fn function(
    unit: &mut TranslationUnit,
    name: &str,
    params: &[(&str, Type)],
    ret: Type,
) -> (DeclId, Vec<DeclId>) {
    let f = unit.declare_function(name, params, ret, None);
    let ps = unit.params(f).to_vec();
    (f, ps)
}

/// Give `f` the body `{ return value; }`.
pub fn returning(unit: &mut TranslationUnit, f: DeclId, value: ExprId) -> StmtId {
    let ret = unit.arena.ret(Some(value));
    let body = unit.arena.compound(vec![ret]);
    unit.set_body(f, body);
    body
}

pub fn names(unit: &mut TranslationUnit, text: &str) -> ExprId {
    unit.arena.string(text)
}

pub struct Outcome {
    pub result: Result<ForwardResult, DiffError>,
    pub diagnostics: Diagnostics,
}

impl Outcome {
    pub fn codes(&self) -> Vec<&'static str> {
        self.diagnostics.all().iter().map(|d| d.code).collect()
    }
}

pub fn differentiate(
    unit: &mut TranslationUnit,
    ctx: &DiffContext,
    f: DeclId,
    spec: ExprId,
) -> Outcome {
    init_logging();
    let mut diagnostics = Diagnostics::new();
    let result = differentiate_forward(unit, ctx, f, spec, &mut diagnostics);
    Outcome {
        result,
        diagnostics,
    }
}
