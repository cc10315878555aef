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

//! Deep copies of original code, rebound to the derivative function.
//!
//! Copying is split in two phases. [`clone_expr`] / [`clone_stmt`] produce a
//! structurally identical, independently owned subtree that still refers
//! to the original declarations. [`rebind_expr`] / [`rebind_stmt`] then
//! retarget every reference through a [`RebindMap`]. Every reference is
//! resolved before the first node is rewritten, so a missing mapping leaves
//! the copy untouched and surfaces as [`InternalError::UnresolvedReference`].

use std::collections::{HashMap, HashSet};

use crate::ast::{Arena, Callee, Decl, DeclId, DeclKind, ExprId, ExprKind, StmtId, StmtKind};
use crate::error::InternalError;

/// Substitution from declarations of the original function to their
/// counterparts in the function being synthesized.
///
/// Only declarations the original function owns (its parameters and
/// locals) need a mapping; anything else, such as globals, fields and
/// functions, is shared and passes through unchanged.
#[derive(Debug, Clone, Default)]
pub struct RebindMap {
    owned: HashSet<DeclId>,
    map: HashMap<DeclId, DeclId>,
}

impl RebindMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map that owns the parameters and locals of `function`.
    pub fn for_function(arena: &Arena, function: DeclId) -> Self {
        let mut map = Self::new();
        if let Some(func) = arena.decl(function).as_function() {
            map.owned.extend(func.params.iter().copied());
            if let Some(body) = func.body {
                map.owned.extend(arena.declared_vars(body));
            }
        }
        map
    }

    pub fn own(&mut self, decl: DeclId) {
        self.owned.insert(decl);
    }

    pub fn insert(&mut self, from: DeclId, to: DeclId) {
        self.owned.insert(from);
        self.map.insert(from, to);
    }

    pub fn get(&self, decl: DeclId) -> Option<DeclId> {
        self.map.get(&decl).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn resolve(&self, arena: &Arena, decl: DeclId) -> Result<DeclId, InternalError> {
        if let Some(to) = self.map.get(&decl) {
            return Ok(*to);
        }
        if self.owned.contains(&decl) {
            return Err(InternalError::UnresolvedReference {
                decl,
                name: arena.decl(decl).name.clone(),
            });
        }
        Ok(decl)
    }
}

/// Structural copy of `expr`. References are left pointing at the same
/// declarations.
pub fn clone_expr(arena: &mut Arena, expr: ExprId) -> ExprId {
    let node = arena.expr(expr).clone();
    let kind = match node.kind {
        ExprKind::Paren(inner) => ExprKind::Paren(clone_expr(arena, inner)),
        ExprKind::ImplicitCast { ty, expr } => ExprKind::ImplicitCast {
            ty,
            expr: clone_expr(arena, expr),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: clone_expr(arena, operand),
        },
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: clone_expr(arena, lhs),
            rhs: clone_expr(arena, rhs),
        },
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => ExprKind::Conditional {
            cond: clone_expr(arena, cond),
            then: clone_expr(arena, then),
            otherwise: clone_expr(arena, otherwise),
        },
        ExprKind::Call { callee, args } => {
            let callee = match callee {
                Callee::Function(f) => Callee::Function(f),
                Callee::Method { receiver, name } => Callee::Method {
                    receiver: clone_expr(arena, receiver),
                    name,
                },
            };
            let args = args.into_iter().map(|a| clone_expr(arena, a)).collect();
            ExprKind::Call { callee, args }
        }
        ExprKind::Subscript { base, index } => ExprKind::Subscript {
            base: clone_expr(arena, base),
            index: clone_expr(arena, index),
        },
        ExprKind::InitList(items) => {
            ExprKind::InitList(items.into_iter().map(|e| clone_expr(arena, e)).collect())
        }
        leaf => leaf,
    };
    arena.add_expr(kind, node.span)
}

/// Structural copy of `stmt`. Local variables get fresh declarations; the
/// returned pairs map each original local to its copy.
pub fn clone_stmt(arena: &mut Arena, stmt: StmtId) -> (StmtId, Vec<(DeclId, DeclId)>) {
    let mut locals = Vec::new();
    let copy = clone_stmt_into(arena, stmt, &mut locals);
    (copy, locals)
}

fn clone_stmt_into(arena: &mut Arena, stmt: StmtId, locals: &mut Vec<(DeclId, DeclId)>) -> StmtId {
    let node = arena.stmt(stmt).clone();
    let kind = match node.kind {
        StmtKind::Compound(children) => StmtKind::Compound(
            children
                .into_iter()
                .map(|s| clone_stmt_into(arena, s, locals))
                .collect(),
        ),
        StmtKind::Decl(decls) => {
            let copies = decls
                .into_iter()
                .map(|d| {
                    let copy = clone_var(arena, d);
                    locals.push((d, copy));
                    copy
                })
                .collect();
            StmtKind::Decl(copies)
        }
        StmtKind::Expr(e) => StmtKind::Expr(clone_expr(arena, e)),
        StmtKind::Return(value) => StmtKind::Return(value.map(|v| clone_expr(arena, v))),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => StmtKind::If {
            cond: clone_expr(arena, cond),
            then: clone_stmt_into(arena, then, locals),
            otherwise: otherwise.map(|s| clone_stmt_into(arena, s, locals)),
        },
        StmtKind::Null => StmtKind::Null,
    };
    arena.add_stmt(kind, node.span)
}

fn clone_var(arena: &mut Arena, decl: DeclId) -> DeclId {
    let original = arena.decl(decl).clone();
    let kind = match original.kind {
        DeclKind::Var { init } => DeclKind::Var {
            init: init.map(|e| clone_expr(arena, e)),
        },
        other => other,
    };
    arena.add_decl(Decl { kind, ..original })
}

fn collect_refs(arena: &Arena, expr: ExprId, out: &mut Vec<(ExprId, DeclId)>) {
    match arena.kind(expr) {
        ExprKind::DeclRef(decl) => out.push((expr, *decl)),
        ExprKind::Paren(inner) | ExprKind::ImplicitCast { expr: inner, .. } => {
            collect_refs(arena, *inner, out)
        }
        ExprKind::Unary { operand, .. } => collect_refs(arena, *operand, out),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Subscript { base: lhs, index: rhs } => {
            collect_refs(arena, *lhs, out);
            collect_refs(arena, *rhs, out);
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            for e in [*cond, *then, *otherwise] {
                collect_refs(arena, e, out);
            }
        }
        ExprKind::Call { callee, args } => {
            if let Callee::Method { receiver, .. } = callee {
                collect_refs(arena, *receiver, out);
            }
            for a in args {
                collect_refs(arena, *a, out);
            }
        }
        ExprKind::InitList(items) => {
            for e in items {
                collect_refs(arena, *e, out);
            }
        }
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::DefaultArg => {}
    }
}

fn collect_stmt_refs(arena: &Arena, stmt: StmtId, out: &mut Vec<(ExprId, DeclId)>) {
    match &arena.stmt(stmt).kind {
        StmtKind::Compound(children) => {
            for s in children {
                collect_stmt_refs(arena, *s, out);
            }
        }
        StmtKind::Decl(decls) => {
            for d in decls {
                if let Some(init) = arena.var_init(*d) {
                    collect_refs(arena, init, out);
                }
            }
        }
        StmtKind::Expr(e) | StmtKind::Return(Some(e)) => collect_refs(arena, *e, out),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            collect_refs(arena, *cond, out);
            collect_stmt_refs(arena, *then, out);
            if let Some(s) = otherwise {
                collect_stmt_refs(arena, *s, out);
            }
        }
        StmtKind::Return(None) | StmtKind::Null => {}
    }
}

fn apply_rebinding(
    arena: &mut Arena,
    refs: Vec<(ExprId, DeclId)>,
    map: &RebindMap,
) -> Result<usize, InternalError> {
    let resolved = refs
        .into_iter()
        .map(|(expr, decl)| map.resolve(arena, decl).map(|to| (expr, decl, to)))
        .collect::<Result<Vec<_>, _>>()?;
    let mut changed = 0;
    for (expr, from, to) in resolved {
        if from != to {
            arena.expr_mut(expr).kind = ExprKind::DeclRef(to);
            changed += 1;
        }
    }
    Ok(changed)
}

/// Retarget every reference under `expr`. Returns the number of rewritten
/// references.
pub fn rebind_expr(arena: &mut Arena, expr: ExprId, map: &RebindMap) -> Result<usize, InternalError> {
    let mut refs = Vec::new();
    collect_refs(arena, expr, &mut refs);
    apply_rebinding(arena, refs, map)
}

pub fn rebind_stmt(arena: &mut Arena, stmt: StmtId, map: &RebindMap) -> Result<usize, InternalError> {
    let mut refs = Vec::new();
    collect_stmt_refs(arena, stmt, &mut refs);
    apply_rebinding(arena, refs, map)
}

/// [`clone_expr`] followed by [`rebind_expr`].
pub fn clone_and_rebind_expr(
    arena: &mut Arena,
    expr: ExprId,
    map: &RebindMap,
) -> Result<ExprId, InternalError> {
    let copy = clone_expr(arena, expr);
    rebind_expr(arena, copy, map)?;
    Ok(copy)
}

/// [`clone_stmt`] followed by [`rebind_stmt`]; copied locals are added to
/// `map` first so references to them resolve.
pub fn clone_and_rebind_stmt(
    arena: &mut Arena,
    stmt: StmtId,
    map: &mut RebindMap,
) -> Result<StmtId, InternalError> {
    let (copy, locals) = clone_stmt(arena, stmt);
    for (from, to) in locals {
        map.insert(from, to);
    }
    rebind_stmt(arena, copy, map)?;
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, TranslationUnit};
    use crate::types::Type;

    fn square() -> (TranslationUnit, DeclId, DeclId, StmtId) {
        let mut unit = TranslationUnit::new();
        let f = unit.declare_function("f", &[("x", Type::Double)], Type::Double, None);
        let x = unit.params(f)[0];
        let a = &mut unit.arena;
        let xr = a.decl_ref(x);
        let xr2 = a.decl_ref(x);
        let sq = a.binary(BinOp::Mul, xr, xr2);
        let y = a.var("y", Type::Double, Some(sq));
        let decl = a.decl_stmt(vec![y]);
        let yr = a.decl_ref(y);
        let ret = a.ret(Some(yr));
        let body = a.compound(vec![decl, ret]);
        unit.set_body(f, body);
        (unit, f, x, body)
    }

    #[test]
    fn clone_is_independent() {
        let (mut unit, _, x, _) = square();
        let a = &mut unit.arena;
        let xr = a.decl_ref(x);
        let one = a.int(1);
        let sum = a.binary(BinOp::Add, xr, one);
        let copy = clone_expr(a, sum);
        assert_ne!(copy, sum);
        assert_eq!(a.kind(sum), &ExprKind::Binary { op: BinOp::Add, lhs: xr, rhs: one });
        match a.kind(copy) {
            ExprKind::Binary { lhs, .. } => {
                assert_ne!(*lhs, xr);
                assert_eq!(a.referenced_decl(*lhs), Some(x));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn statements_rebind_params_and_locals() {
        let (mut unit, f, x, body) = square();
        let mut map = RebindMap::for_function(&unit.arena, f);
        let x2 = unit.arena.var("x", Type::Double, None);
        map.insert(x, x2);

        let copy = clone_and_rebind_stmt(&mut unit.arena, body, &mut map).expect("rebind");
        let a = &unit.arena;
        let locals = a.declared_vars(copy);
        assert_eq!(locals.len(), 1);
        let init = a.var_init(locals[0]).expect("init");
        match a.kind(init) {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert_eq!(a.referenced_decl(*lhs), Some(x2));
                assert_eq!(a.referenced_decl(*rhs), Some(x2));
            }
            other => panic!("unexpected {other:?}"),
        }
        // The original body is untouched.
        let original_local = a.declared_vars(body)[0];
        assert_ne!(original_local, locals[0]);
    }

    #[test]
    fn missing_mapping_fails_before_rewriting() {
        let (mut unit, f, x, _) = square();
        let global = unit.arena.var("g", Type::Double, None);
        let map = RebindMap::for_function(&unit.arena, f);
        let a = &mut unit.arena;
        let gr = a.decl_ref(global);
        let xr = a.decl_ref(x);
        let sum = a.binary(BinOp::Add, gr, xr);
        let copy = clone_expr(a, sum);

        let err = rebind_expr(a, copy, &map).expect_err("x is unmapped");
        assert_eq!(
            err,
            InternalError::UnresolvedReference {
                decl: x,
                name: "x".to_string()
            }
        );
        match a.kind(copy) {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert_eq!(a.referenced_decl(*lhs), Some(global));
                assert_eq!(a.referenced_decl(*rhs), Some(x));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
