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

//! Name lookup and overload resolution services.
//!
//! The engine asks two questions of the host: "is this name already bound
//! where I am about to declare something?" and "is there a function named
//! so-and-so, in such-and-such namespace, callable with these argument
//! types?". Both are traits so a host front-end can answer with its own
//! semantic analyzer; [`TranslationUnit`] and [`SignatureResolver`] are the
//! default answers.

use crate::ast::{DeclId, DeclKind, TranslationUnit};
use crate::types::Type;

pub trait NameLookup {
    /// Declaration visible as `name` from `context`, innermost first.
    fn lookup(&self, name: &str, context: Option<DeclId>) -> Option<DeclId>;
}

impl NameLookup for TranslationUnit {
    fn lookup(&self, name: &str, context: Option<DeclId>) -> Option<DeclId> {
        let mut cursor = context;
        while let Some(ctx) = cursor {
            let scopes = if self.decl(ctx).as_namespace().is_some() {
                self.namespace_chain(ctx)
            } else {
                vec![ctx]
            };
            for scope in scopes {
                if let Some(found) = self
                    .members(Some(scope))
                    .iter()
                    .rev()
                    .find(|id| self.name(**id) == name)
                {
                    return Some(*found);
                }
            }
            cursor = self.decl(ctx).context;
        }
        self.top_level()
            .iter()
            .rev()
            .find(|id| self.name(**id) == name)
            .copied()
    }
}

/// Every declaration named `name` in any declaration of the top-level
/// namespace `namespace`.
pub fn lookup_qualified(unit: &TranslationUnit, namespace: &str, name: &str) -> Vec<DeclId> {
    unit.top_level()
        .iter()
        .filter(|id| unit.name(**id) == namespace && unit.decl(**id).as_namespace().is_some())
        .flat_map(|ns| unit.members(Some(*ns)).iter().copied())
        .filter(|id| unit.name(*id) == name)
        .collect()
}

/// A call signature to match against visible function declarations.
#[derive(Debug, Clone)]
pub struct OverloadRequest<'a> {
    pub name: &'a str,
    /// Top-level namespace to search; `None` searches translation-unit scope.
    pub namespace: Option<&'a str>,
    pub arg_types: &'a [Type],
}

pub trait OverloadResolver {
    fn find_overload(&self, unit: &TranslationUnit, request: &OverloadRequest<'_>) -> Option<DeclId>;
}

/// Arity-and-type matcher: exact parameter types beat arithmetic
/// conversions, template parameters accept anything, ties go to the first
/// declaration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureResolver;

impl OverloadResolver for SignatureResolver {
    fn find_overload(&self, unit: &TranslationUnit, request: &OverloadRequest<'_>) -> Option<DeclId> {
        let candidates: Vec<DeclId> = match request.namespace {
            Some(ns) => lookup_qualified(unit, ns, request.name),
            None => unit
                .top_level()
                .iter()
                .copied()
                .filter(|id| unit.name(*id) == request.name)
                .collect(),
        };

        let mut best: Option<(u32, DeclId)> = None;
        for candidate in candidates {
            let Some(score) = match_score(unit, candidate, request.arg_types) else {
                continue;
            };
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate));
            }
        }
        if best.is_none() {
            log::trace!(
                "no viable overload for {}{}",
                request.namespace.map(|ns| format!("{ns}::")).unwrap_or_default(),
                request.name
            );
        }
        best.map(|(_, id)| id)
    }
}

fn match_score(unit: &TranslationUnit, candidate: DeclId, args: &[Type]) -> Option<u32> {
    let DeclKind::Function(func) = &unit.decl(candidate).kind else {
        return None;
    };
    if args.len() < func.params.len() || (args.len() > func.params.len() && !func.variadic) {
        return None;
    }
    let mut score = 0;
    for (param, arg) in func.params.iter().zip(args) {
        let param_ty = unit.decl(*param).ty.non_reference();
        let arg_ty = arg.non_reference();
        score += match param_ty {
            Type::Generic(_) => 1,
            p if p == arg_ty => 3,
            p if p.is_arithmetic() && arg_ty.is_arithmetic() => 2,
            _ => return None,
        };
    }
    Some(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward_through_namespaces() {
        let mut unit = TranslationUnit::new();
        let global = unit.declare_function("g", &[], Type::Void, None);
        let ns = unit.declare_namespace("inner", false, None);
        let local = unit.declare_function("h", &[], Type::Void, Some(ns));
        assert_eq!(unit.lookup("h", Some(ns)), Some(local));
        assert_eq!(unit.lookup("g", Some(ns)), Some(global));
        assert_eq!(unit.lookup("h", None), None);
    }

    #[test]
    fn resolver_prefers_exact_types() {
        let mut unit = TranslationUnit::new();
        let ns = unit.declare_namespace("custom_derivatives", false, None);
        let as_int = unit.declare_function("f_pushforward", &[("x", Type::Int)], Type::Int, Some(ns));
        let as_double =
            unit.declare_function("f_pushforward", &[("x", Type::Double)], Type::Double, Some(ns));
        let request = OverloadRequest {
            name: "f_pushforward",
            namespace: Some("custom_derivatives"),
            arg_types: &[Type::Double],
        };
        assert_eq!(SignatureResolver.find_overload(&unit, &request), Some(as_double));
        let request = OverloadRequest {
            arg_types: &[Type::Int],
            ..request
        };
        assert_eq!(SignatureResolver.find_overload(&unit, &request), Some(as_int));
    }

    #[test]
    fn resolver_respects_arity_and_variadics() {
        let mut unit = TranslationUnit::new();
        let ns = unit.declare_namespace("rt", false, None);
        let helper = unit.declare_function("helper", &[("f", Type::generic("F"))], Type::Double, Some(ns));
        let request = OverloadRequest {
            name: "helper",
            namespace: Some("rt"),
            arg_types: &[Type::Double, Type::Double],
        };
        assert_eq!(SignatureResolver.find_overload(&unit, &request), None);
        unit.set_variadic(helper, true);
        assert_eq!(SignatureResolver.find_overload(&unit, &request), Some(helper));
    }
}
