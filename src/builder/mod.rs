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

//! Scope and declaration builder for synthesized code.
//!
//! A [`Builder`] lives for exactly one differentiation request. It owns the
//! pass-scoped state: the scope stack, the identifier counters and the
//! stack of statement blocks under construction. Scopes and blocks are only
//! opened through [`Builder::in_scope`], [`Builder::in_block`] and
//! [`Builder::in_enclosing_namespaces`], which close them again on every
//! exit path, including early `?` returns from the closure.

pub mod store;

pub use store::useful_to_store;

use crate::ast::{
    Arena, BinOp, Callee, Decl, DeclId, DeclKind, ExprId, ExprKind, Span, StmtId, StmtKind,
    TranslationUnit, UnaryOp,
};
use crate::context::DiffContext;
use crate::lookup::{NameLookup, OverloadRequest};
use crate::opt::fold;
use crate::scope::{is_counted_prefix, IdentCounters, ScopeKind, ScopeStack};
use crate::types::Type;

pub struct Builder<'u, 'c> {
    unit: &'u mut TranslationUnit,
    ctx: &'c DiffContext,
    scopes: ScopeStack,
    counters: IdentCounters,
    blocks: Vec<Vec<StmtId>>,
    decl_context: Option<DeclId>,
}

impl<'u, 'c> Builder<'u, 'c> {
    pub fn new(unit: &'u mut TranslationUnit, ctx: &'c DiffContext) -> Self {
        Self {
            unit,
            ctx,
            scopes: ScopeStack::new(),
            counters: IdentCounters::new(),
            blocks: vec![Vec::new()],
            decl_context: None,
        }
    }

    pub fn unit(&self) -> &TranslationUnit {
        &*self.unit
    }

    pub fn unit_mut(&mut self) -> &mut TranslationUnit {
        &mut *self.unit
    }

    pub fn arena(&self) -> &Arena {
        &self.unit.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.unit.arena
    }

    pub fn ctx(&self) -> &'c DiffContext {
        self.ctx
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Namespace or record new declarations are placed in.
    pub fn decl_context(&self) -> Option<DeclId> {
        self.decl_context
    }

    pub fn type_of(&self, expr: ExprId) -> Type {
        self.ctx.oracle().type_of(&self.unit.arena, expr)
    }

    // --- scopes and blocks ---------------------------------------------

    /// Run `f` inside a fresh scope of `kind`.
    pub fn in_scope<R>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.scopes.depth();
        self.scopes.push(kind);
        let out = f(self);
        self.scopes.pop();
        debug_assert_eq!(self.scopes.depth(), depth, "unbalanced scope inside builder closure");
        out
    }

    /// Run `f` with a fresh statement block and block scope; returns the
    /// closure result together with the compound statement collected.
    pub fn in_block<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> (R, StmtId) {
        self.blocks.push(Vec::new());
        let out = self.in_scope(ScopeKind::Block, f);
        let stmts = self.blocks.pop().unwrap_or_default();
        let block = self.unit.arena.compound(stmts);
        (out, block)
    }

    /// Expression statements whose value is discarded and that have no side
    /// effects are dropped.
    pub fn is_unused_result(&self, stmt: StmtId) -> bool {
        match self.unit.arena.stmt(stmt).kind {
            StmtKind::Expr(expr) => !has_side_effects(&self.unit.arena, expr),
            _ => false,
        }
    }

    /// Append `stmt` to `block` unless it is an unused result. Returns
    /// whether the statement was kept.
    pub fn add_to_block(&self, stmt: StmtId, block: &mut Vec<StmtId>) -> bool {
        if self.is_unused_result(stmt) {
            log::trace!("dropping unused expression statement {stmt:?}");
            return false;
        }
        block.push(stmt);
        true
    }

    pub fn add_to_current_block(&mut self, stmt: StmtId) -> bool {
        if self.is_unused_result(stmt) {
            log::trace!("dropping unused expression statement {stmt:?}");
            return false;
        }
        if let Some(block) = self.blocks.last_mut() {
            block.push(stmt);
        }
        true
    }

    /// Statements collected outside any [`Builder::in_block`] call.
    pub fn take_root_block(&mut self) -> Vec<StmtId> {
        self.blocks.first_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Run `f` with unqualified names resolved from `context`, the way
    /// code placed there would see them.
    pub fn in_decl_context<R>(&mut self, context: Option<DeclId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.decl_context, context);
        let out = f(self);
        self.decl_context = saved;
        out
    }

    // --- identifiers and declarations ----------------------------------

    fn is_visible(&self, name: &str) -> bool {
        self.scopes.lookup(name).is_some() || self.unit.lookup(name, self.decl_context).is_some()
    }

    /// Fresh identifier for `prefix`. Temporary prefixes are always
    /// numbered from a per-pass counter that never goes back; other
    /// prefixes are returned bare when free and numbered otherwise.
    pub fn create_unique_identifier(&mut self, prefix: &str) -> String {
        let counted = is_counted_prefix(prefix);
        let mut local = 0usize;
        let mut candidate = if counted {
            format!("{prefix}{}", self.counters.next(prefix))
        } else {
            prefix.to_string()
        };
        while self.is_visible(&candidate) {
            let suffix = if counted {
                self.counters.next(prefix)
            } else {
                let s = local;
                local += 1;
                s
            };
            candidate = format!("{prefix}{suffix}");
        }
        candidate
    }

    /// Declare a variable named exactly `name` in the current scope. The
    /// declaration is not attached to any block.
    pub fn build_var(&mut self, ty: Type, name: &str, init: Option<ExprId>) -> DeclId {
        let decl = self.unit.arena.var(name, ty, init);
        self.scopes.declare(name, decl);
        log::trace!("declared '{name}' ({decl:?})");
        decl
    }

    /// Parameter declaration for a function under construction.
    pub fn build_param(&mut self, ty: Type, name: &str) -> DeclId {
        let decl = self.unit.arena.add_decl(Decl {
            name: name.to_string(),
            ty,
            kind: DeclKind::Param,
            context: None,
            span: Span::default(),
        });
        self.scopes.declare(name, decl);
        decl
    }

    /// Like [`Builder::build_var`] with a fresh identifier derived from `prefix`.
    pub fn build_var_prefixed(&mut self, ty: Type, prefix: &str, init: Option<ExprId>) -> DeclId {
        let name = self.create_unique_identifier(prefix);
        self.build_var(ty, &name, init)
    }

    pub fn build_decl_stmt(&mut self, decls: Vec<DeclId>) -> StmtId {
        self.unit.arena.decl_stmt(decls)
    }

    pub fn build_decl_ref(&mut self, decl: DeclId) -> ExprId {
        self.unit.arena.decl_ref(decl)
    }

    /// Parenthesize binary and conditional operators; anything else is
    /// returned as is.
    pub fn build_parens(&mut self, expr: ExprId) -> ExprId {
        let arena = &self.unit.arena;
        match arena.kind(arena.ignore_casts(expr)) {
            ExprKind::Binary { .. } | ExprKind::Conditional { .. } => self.unit.arena.paren(expr),
            _ => expr,
        }
    }

    /// Materialize `expr` in a temporary declared in the current block and
    /// return a reference to it. Cheap expressions are returned unchanged
    /// unless `force` is set. A modifiable lvalue is bound by reference.
    pub fn store_and_ref(&mut self, expr: ExprId, prefix: &str, force: bool) -> ExprId {
        if !force && !useful_to_store(&self.unit.arena, expr) {
            return expr;
        }
        let mut ty = self.type_of(expr);
        if self.ctx.oracle().is_modifiable_lvalue(&self.unit.arena, expr) {
            ty = ty.reference();
        }
        let var = self.build_var_prefixed(ty, prefix, Some(expr));
        log::debug!("stored temporary '{}'", self.unit.name(var));
        let stmt = self.build_decl_stmt(vec![var]);
        self.add_to_current_block(stmt);
        self.build_decl_ref(var)
    }

    // --- expressions ---------------------------------------------------

    pub fn build_unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        let operand = self.build_parens(operand);
        self.unit.arena.unary(op, operand)
    }

    /// `lhs op rhs`, folding integer constants and parenthesizing compound
    /// operands. Neither side of an assignment is wrapped.
    pub fn build_binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        if let Some(folded) = fold::fold_binary(&mut self.unit.arena, op, lhs, rhs) {
            return folded;
        }
        if op.is_assignment() {
            return self.unit.arena.binary(op, lhs, rhs);
        }
        let lhs = self.build_parens(lhs);
        let rhs = self.build_parens(rhs);
        self.unit.arena.binary(op, lhs, rhs)
    }

    pub fn build_conditional(&mut self, cond: ExprId, then: ExprId, otherwise: ExprId) -> ExprId {
        let cond = self.build_parens(cond);
        self.unit.arena.conditional(cond, then, otherwise)
    }

    pub fn build_cast(&mut self, ty: Type, expr: ExprId) -> ExprId {
        let expr = self.build_parens(expr);
        self.unit.arena.cast(ty, expr)
    }

    /// Zero of `ty`: `0` converted to a scalar type, `{}` for aggregates.
    pub fn zero_init(&mut self, ty: &Type) -> ExprId {
        if ty.non_reference().is_scalar() {
            fold::synthesize_literal(&mut self.unit.arena, ty, 0)
        } else {
            self.unit.arena.init_list(Vec::new())
        }
    }

    pub fn literal(&mut self, ty: &Type, value: i64) -> ExprId {
        fold::synthesize_literal(&mut self.unit.arena, ty, value)
    }

    /// `a[i][j]` to `(a, [i, j])`, looking through parentheses and casts.
    pub fn split_array_subscript(&self, expr: ExprId) -> (ExprId, Vec<ExprId>) {
        let arena = &self.unit.arena;
        let mut indices = Vec::new();
        let mut cursor = arena.ignore_paren_imp_casts(expr);
        while let ExprKind::Subscript { base, index } = arena.kind(cursor) {
            indices.push(*index);
            cursor = arena.ignore_paren_imp_casts(*base);
        }
        indices.reverse();
        (cursor, indices)
    }

    pub fn build_array_subscript(&mut self, base: ExprId, indices: &[ExprId]) -> ExprId {
        indices
            .iter()
            .fold(base, |acc, index| self.unit.arena.subscript(acc, *index))
    }

    pub fn build_call_to_function(&mut self, function: DeclId, args: Vec<ExprId>) -> ExprId {
        self.unit.arena.call(function, args)
    }

    pub fn build_call_to_method(&mut self, receiver: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        let receiver = self.build_parens(receiver);
        self.unit.arena.method_call(receiver, method, args)
    }

    /// Resolve `name` in `namespace` against the types of `args` and build
    /// the call, or `None` when no overload is viable.
    pub fn build_call_by_name(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        args: Vec<ExprId>,
    ) -> Option<ExprId> {
        let arg_types: Vec<Type> = args.iter().map(|a| self.type_of(*a)).collect();
        let request = OverloadRequest {
            name,
            namespace,
            arg_types: &arg_types,
        };
        let function = self.ctx.resolver().find_overload(&*self.unit, &request)?;
        Some(self.build_call_to_function(function, args))
    }

    pub fn array_ref_size(&mut self, array_ref: ExprId) -> ExprId {
        self.build_call_to_method(array_ref, "size", Vec::new())
    }

    pub fn array_ref_slice(&mut self, array_ref: ExprId, start: ExprId, len: ExprId) -> ExprId {
        self.build_call_to_method(array_ref, "slice", vec![start, len])
    }

    // --- namespaces ----------------------------------------------------

    /// Open namespace `name` in the current declaration context, linked to
    /// any earlier declaration of it, and enter its scope. Pair with
    /// [`Builder::end_namespace_decl`]; prefer
    /// [`Builder::in_enclosing_namespaces`].
    pub fn build_namespace_decl(&mut self, name: &str, inline: bool) -> DeclId {
        let ns = self.unit.declare_namespace(name, inline, self.decl_context);
        self.scopes.push(ScopeKind::Namespace);
        self.decl_context = Some(ns);
        log::trace!("opened namespace '{name}' ({ns:?})");
        ns
    }

    pub fn end_namespace_decl(&mut self) {
        self.scopes.pop();
        self.decl_context = self
            .decl_context
            .and_then(|ns| self.unit.decl(ns).context);
    }

    /// Recreate the namespace nesting of `original`, run `f` inside it and
    /// close every namespace again.
    pub fn in_enclosing_namespaces<R>(
        &mut self,
        original: DeclId,
        f: impl FnOnce(&mut Self, Option<DeclId>) -> R,
    ) -> R {
        let mut chain = Vec::new();
        let mut cursor = self.unit.enclosing_namespace(original);
        while let Some(ns) = cursor {
            chain.push(ns);
            cursor = self.unit.enclosing_namespace(ns);
        }
        let saved = self.decl_context;
        self.decl_context = None;
        for ns in chain.iter().rev() {
            let decl = self.unit.decl(*ns);
            let name = decl.name.clone();
            let inline = decl.as_namespace().is_some_and(|n| n.inline);
            self.build_namespace_decl(&name, inline);
        }
        let innermost = self.decl_context;
        let out = f(self, innermost);
        for _ in &chain {
            self.end_namespace_decl();
        }
        self.decl_context = saved;
        out
    }
}

/// Whether evaluating `expr` may change program state.
pub fn has_side_effects(arena: &Arena, expr: ExprId) -> bool {
    match arena.kind(expr) {
        ExprKind::Call { .. } => true,
        ExprKind::Unary { op, operand } => {
            op.is_increment_or_decrement() || has_side_effects(arena, *operand)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            op.is_assignment() || has_side_effects(arena, *lhs) || has_side_effects(arena, *rhs)
        }
        ExprKind::Paren(inner) | ExprKind::ImplicitCast { expr: inner, .. } => {
            has_side_effects(arena, *inner)
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => [*cond, *then, *otherwise]
            .iter()
            .any(|e| has_side_effects(arena, *e)),
        ExprKind::Subscript { base, index } => {
            has_side_effects(arena, *base) || has_side_effects(arena, *index)
        }
        ExprKind::InitList(items) => items.iter().any(|e| has_side_effects(arena, *e)),
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::DefaultArg
        | ExprKind::DeclRef(_) => false,
    }
}

/// Method name of a call expression, if it is one.
pub fn method_name(arena: &Arena, expr: ExprId) -> Option<&str> {
    match arena.kind(expr) {
        ExprKind::Call {
            callee: Callee::Method { name, .. },
            ..
        } => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffOptions;
    use crate::context::install_runtime_library;

    fn unit() -> TranslationUnit {
        let mut unit = TranslationUnit::new();
        install_runtime_library(&mut unit, &DiffOptions::default());
        unit
    }

    #[test]
    fn bare_name_then_numbered() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        b.in_scope(ScopeKind::Function, |b| {
            let first = b.create_unique_identifier("_d_x");
            assert_eq!(first, "_d_x");
            b.build_var(Type::Double, &first, None);
            assert_eq!(b.create_unique_identifier("_d_x"), "_d_x0");
        });
    }

    #[test]
    fn temporaries_are_always_numbered() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        assert_eq!(b.create_unique_identifier("_t"), "_t0");
        // Counters advance even when the earlier name was never declared.
        assert_eq!(b.create_unique_identifier("_t"), "_t1");
    }

    #[test]
    fn unique_identifier_skips_unit_declarations() {
        let mut unit = unit();
        unit.declare_function("tmp", &[], Type::Double, None);
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        assert_eq!(b.create_unique_identifier("tmp"), "tmp0");
    }

    #[test]
    fn scopes_are_released_on_error_paths() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let result: Result<(), &str> = b.in_scope(ScopeKind::Function, |b| {
            b.in_block(|_| Err::<(), _>("boom")).0?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(b.scopes().depth(), 0);
    }

    #[test]
    fn store_and_ref_skips_cheap_expressions() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let x = b.build_var(Type::Double, "x", None);
        let xr = b.build_decl_ref(x);
        assert_eq!(b.store_and_ref(xr, "_t", false), xr);

        let xr2 = b.build_decl_ref(x);
        let product = b.build_binary(BinOp::Mul, xr, xr2);
        let ((), block) = b.in_block(|b| {
            let stored = b.store_and_ref(product, "_t", false);
            assert_ne!(stored, product);
        });
        match &b.arena().stmt(block).kind {
            StmtKind::Compound(stmts) => assert_eq!(stmts.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn forced_store_of_lvalue_binds_reference() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let x = b.build_var(Type::Double, "x", None);
        let xr = b.build_decl_ref(x);
        let stored = b.store_and_ref(xr, "_t", true);
        let var = b.arena().referenced_decl(stored).expect("decl ref");
        assert_eq!(b.arena().decl(var).ty, Type::Double.reference());
        assert_eq!(b.take_root_block().len(), 1);
    }

    #[test]
    fn unused_results_are_dropped() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let x = b.build_var(Type::Double, "x", None);
        let xr = b.build_decl_ref(x);
        let bare = b.arena_mut().expr_stmt(xr);
        assert!(!b.add_to_current_block(bare));

        let one = b.literal(&Type::Double, 1);
        let assign = b.build_binary(BinOp::Assign, xr, one);
        let stmt = b.arena_mut().expr_stmt(assign);
        assert!(b.add_to_current_block(stmt));
    }

    #[test]
    fn assignment_sides_are_not_parenthesized() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let x = b.build_var(Type::Double, "x", None);
        let y = b.build_var(Type::Double, "y", None);
        let xr = b.build_decl_ref(x);
        let yr = b.build_decl_ref(y);
        let product = b.build_binary(BinOp::Mul, xr, yr);
        let target = b.build_decl_ref(y);
        let assign = b.build_binary(BinOp::Assign, target, product);
        match b.arena().kind(assign) {
            ExprKind::Binary { rhs, .. } => assert_eq!(*rhs, product),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn identifiers_avoid_names_of_the_lookup_context() {
        let mut unit = unit();
        let ns = unit.declare_namespace("n", false, None);
        let global = unit.arena.var("_d_y", Type::Double, None);
        unit.add_to_context(Some(ns), global);
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        assert_eq!(b.create_unique_identifier("_d_y"), "_d_y");
        let inside = b.in_decl_context(Some(ns), |b| b.create_unique_identifier("_d_y"));
        assert_eq!(inside, "_d_y0");
        assert_eq!(b.decl_context(), None);
    }

    #[test]
    fn subscripts_split_and_rebuild() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let m = b.build_var(Type::array(Type::array(Type::Double, Some(2)), Some(2)), "m", None);
        let mr = b.build_decl_ref(m);
        let i = b.literal(&Type::Int, 0);
        let j = b.literal(&Type::Int, 1);
        let inner = b.arena_mut().subscript(mr, i);
        let paren = b.arena_mut().paren(inner);
        let outer = b.arena_mut().subscript(paren, j);

        let (base, indices) = b.split_array_subscript(outer);
        assert_eq!(base, mr);
        assert_eq!(indices, vec![i, j]);
        let rebuilt = b.build_array_subscript(base, &indices);
        assert_eq!(b.type_of(rebuilt), Type::Double);
    }

    #[test]
    fn zero_init_by_kind() {
        let mut unit = unit();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let scalar = b.zero_init(&Type::Double);
        assert!(fold::is_zero(b.arena(), scalar));
        assert_eq!(b.type_of(scalar), Type::Double);
        let aggregate = b.zero_init(&Type::array(Type::Double, Some(3)));
        assert!(matches!(b.arena().kind(aggregate), ExprKind::InitList(items) if items.is_empty()));
    }

    #[test]
    fn namespaces_are_rebuilt_and_closed() {
        let mut unit = unit();
        let outer = unit.declare_namespace("outer", false, None);
        let inner = unit.declare_namespace("detail", true, Some(outer));
        let f = unit.declare_function("f", &[("x", Type::Double)], Type::Double, Some(inner));
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);

        let placed = b.in_enclosing_namespaces(f, |b, ns| {
            assert_eq!(b.scopes().depth(), 2);
            ns
        });
        assert_eq!(b.scopes().depth(), 0);
        assert_eq!(b.decl_context(), None);

        let placed = placed.expect("namespace");
        let decl = b.unit().decl(placed);
        assert_eq!(decl.name, "detail");
        let ns = decl.as_namespace().expect("namespace");
        assert!(ns.inline);
        assert_eq!(ns.previous, Some(inner));
    }

    #[test]
    fn calls_resolve_by_signature() {
        let mut unit = unit();
        unit.declare_function("sin", &[("x", Type::Double)], Type::Double, None);
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let x = b.literal(&Type::Double, 1);
        assert!(b.build_call_by_name("sin", None, vec![x]).is_some());
        assert!(b.build_call_by_name("cos", None, vec![x]).is_none());

        let arr = b.build_var(Type::Double, "a", None);
        let ar = b.build_decl_ref(arr);
        let size = b.array_ref_size(ar);
        assert_eq!(method_name(b.arena(), size), Some("size"));
    }
}
