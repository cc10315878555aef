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

use std::collections::HashMap;

use crate::ast::{
    BinOp, Callee, DeclId, DeclKind, ExprId, ExprKind, FunctionDecl, Span, StmtId, StmtKind,
    TranslationUnit, UnaryOp,
};
use crate::builder::Builder;
use crate::clone::{clone_and_rebind_expr, clone_expr, RebindMap};
use crate::context::DiffContext;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{DiffError, InternalError};
use crate::numdiff;
use crate::opt::fold;
use crate::params::{self, DiffParam, DiffParams, ParamError};
use crate::scope::ScopeKind;
use crate::types::infer::common_arithmetic;
use crate::types::Type;

use super::rules::{self, DerivativeOps};

/// The single variable a forward-mode derivative is taken with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Independent {
    Scalar(DeclId),
    /// One element of an array or pointer parameter.
    Element { array: DeclId, index: usize },
}

impl Independent {
    pub fn decl(&self) -> DeclId {
        match self {
            Independent::Scalar(decl) => *decl,
            Independent::Element { array, .. } => *array,
        }
    }
}

/// Result of a forward-mode differentiation request.
#[derive(Debug, Clone)]
pub struct ForwardResult {
    /// The synthesized `<name>_darg<N>` function.
    pub derivative: DeclId,
    /// Innermost namespace the derivative was placed in.
    pub namespace: Option<DeclId>,
    pub params: DiffParams,
    pub independent: Independent,
}

/// Value and tangent of one expression in the derivative function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprDiff {
    pub value: ExprId,
    pub derivative: ExprId,
}

/// Synthesize the forward-mode derivative of `function` with respect to
/// the variable selected by `spec`.
///
/// Failures are reported to `sink` where they are detected and returned as
/// `Err`; nothing is added to the translation unit's declaration lists
/// unless the whole body could be derived.
pub fn differentiate_forward(
    unit: &mut TranslationUnit,
    ctx: &DiffContext,
    function: DeclId,
    spec: ExprId,
    sink: &mut dyn DiagnosticSink,
) -> Result<ForwardResult, DiffError> {
    let Some(func) = unit.decl(function).as_function().cloned() else {
        return Err(InternalError::NotAFunction(unit.name(function).to_string()).into());
    };
    let name = unit.name(function).to_string();
    log::debug!("forward mode: differentiating '{name}'");

    let params = params::resolve(unit, function, spec, sink)?;
    let span = unit.arena.expr(spec).span;
    if params.len() > 1 {
        return Err(report(sink, DiffError::MultipleIndependents(params.len()), span));
    }
    let param = params
        .iter()
        .next()
        .cloned()
        .ok_or(DiffError::Params(ParamError::NoCandidates))?;
    let independent = classify_independent(unit, &param).map_err(|err| report(sink, err, span))?;
    let Some(body) = func.body else {
        return Err(report(sink, DiffError::MissingBody(name), span));
    };

    let lookup_context = unit.decl(function).context;
    let mut b = Builder::new(unit, ctx);
    let mut visitor = ForwardVisitor {
        map: RebindMap::for_function(b.arena(), function),
        derivs: HashMap::new(),
        arrays: HashMap::new(),
        independent,
        sink,
    };
    // Generated names must not hide anything the cloned body still sees
    // from the original function's namespace.
    let (new_params, new_body) = b.in_decl_context(lookup_context, |b| {
        b.in_scope(ScopeKind::Function, |b| -> Result<_, DiffError> {
            let new_params: Vec<DeclId> = func
                .params
                .iter()
                .map(|p| {
                    let original = b.arena().decl(*p).clone();
                    let copy = b.build_param(original.ty, &original.name);
                    visitor.map.insert(*p, copy);
                    copy
                })
                .collect();
            let (derived, block) = b.in_block(|b| {
                visitor.seed(b, &func);
                visitor.visit_body(b, body)
            });
            derived?;
            Ok((new_params, block))
        })
    })?;

    let derived_name = derivative_name(&name, &param, independent);
    let (derivative, namespace) = b.in_enclosing_namespaces(function, |b, ns| {
        let derivative = b.unit_mut().add_function(
            &derived_name,
            FunctionDecl {
                params: new_params,
                ret: func.ret.clone(),
                body: Some(new_body),
                functor: func.functor,
                variadic: func.variadic,
            },
            ns,
        );
        (derivative, ns)
    });
    log::debug!("forward mode: '{name}' -> '{derived_name}'");

    Ok(ForwardResult {
        derivative,
        namespace,
        params,
        independent,
    })
}

fn report(sink: &mut dyn DiagnosticSink, err: DiffError, span: Span) -> DiffError {
    if let Some(code) = err.code() {
        sink.report(Diagnostic::error(code, err.to_string()).with_span(span));
    }
    err
}

fn classify_independent(unit: &TranslationUnit, param: &DiffParam) -> Result<Independent, DiffError> {
    let decl = unit.decl(param.decl);
    let ty = decl.ty.non_reference();
    let unsupported = || DiffError::UnsupportedParameter {
        name: decl.name.clone(),
        selector: param.interval.to_string(),
        ty: decl.ty.to_string(),
    };
    if param.interval.is_whole() {
        return if ty.is_arithmetic() {
            Ok(Independent::Scalar(param.decl))
        } else {
            Err(unsupported())
        };
    }
    match (ty.element_type(), param.interval.bounds()) {
        (Some(elem), Some((first, last))) if elem.is_arithmetic() && last == first + 1 => {
            Ok(Independent::Element {
                array: param.decl,
                index: first,
            })
        }
        _ => Err(unsupported()),
    }
}

/// Sized arrays of arithmetic elements get a tangent array of the same
/// shape.
fn has_tangent_array(ty: &Type) -> bool {
    match ty {
        Type::Array { elem, len: Some(_) } => elem.is_arithmetic() || has_tangent_array(elem),
        _ => false,
    }
}

fn derivative_name(name: &str, param: &DiffParam, independent: Independent) -> String {
    let base = if name == "operator()" { "operator_call" } else { name };
    match independent {
        Independent::Scalar(_) => format!("{base}_darg{}", param.position),
        Independent::Element { index, .. } => format!("{base}_darg{}_{index}", param.position),
    }
}

struct ForwardVisitor<'s> {
    map: RebindMap,
    /// Original value declaration to its `_d_` declaration.
    derivs: HashMap<DeclId, DeclId>,
    /// Original array declaration to its `_d_` tangent array.
    arrays: HashMap<DeclId, DeclId>,
    independent: Independent,
    sink: &'s mut dyn DiagnosticSink,
}

impl ForwardVisitor<'_> {
    /// `_d_` seeds for every arithmetic parameter, and for the fields of a
    /// functor's record.
    fn seed(&mut self, b: &mut Builder<'_, '_>, func: &FunctionDecl) {
        let mut targets = func.params.clone();
        if let Some(record) = func.functor {
            targets.extend(
                b.unit()
                    .members(Some(record))
                    .iter()
                    .copied()
                    .filter(|m| matches!(b.unit().decl(*m).kind, DeclKind::Field)),
            );
        }
        for original in targets {
            let decl = b.arena().decl(original).clone();
            if has_tangent_array(&decl.ty) && self.independent.decl() != original {
                let init = b.zero_init(&decl.ty);
                let d = b.build_var_prefixed(decl.ty.clone(), &format!("_d_{}", decl.name), Some(init));
                self.arrays.insert(original, d);
                let stmt = b.build_decl_stmt(vec![d]);
                b.add_to_current_block(stmt);
                continue;
            }
            let ty = decl.ty.non_reference().clone();
            if !ty.is_arithmetic() {
                continue;
            }
            let seed = i64::from(self.independent == Independent::Scalar(original));
            let init = b.literal(&ty, seed);
            let d = b.build_var_prefixed(ty, &format!("_d_{}", decl.name), Some(init));
            self.derivs.insert(original, d);
            let stmt = b.build_decl_stmt(vec![d]);
            b.add_to_current_block(stmt);
        }
    }

    fn visit_body(&mut self, b: &mut Builder<'_, '_>, body: StmtId) -> Result<(), DiffError> {
        match b.arena().stmt(body).kind.clone() {
            StmtKind::Compound(children) => children
                .into_iter()
                .try_for_each(|child| self.visit_stmt(b, child)),
            _ => self.visit_stmt(b, body),
        }
    }

    fn visit_branch(&mut self, b: &mut Builder<'_, '_>, stmt: StmtId) -> Result<StmtId, DiffError> {
        let (derived, block) = b.in_block(|b| self.visit_body(b, stmt));
        derived?;
        Ok(block)
    }

    fn visit_stmt(&mut self, b: &mut Builder<'_, '_>, stmt: StmtId) -> Result<(), DiffError> {
        match b.arena().stmt(stmt).kind.clone() {
            StmtKind::Compound(_) => {
                let block = self.visit_branch(b, stmt)?;
                b.add_to_current_block(block);
            }
            StmtKind::Decl(decls) => self.visit_decls(b, decls)?,
            StmtKind::Expr(expr) => {
                let diff = self.visit_expr(b, expr)?;
                let derivative = b.arena_mut().expr_stmt(diff.derivative);
                b.add_to_current_block(derivative);
                let value = b.arena_mut().expr_stmt(diff.value);
                b.add_to_current_block(value);
            }
            StmtKind::Return(value) => {
                let derivative = match value {
                    Some(expr) => Some(self.visit_expr(b, expr)?.derivative),
                    None => None,
                };
                let ret = b.arena_mut().ret(derivative);
                b.add_to_current_block(ret);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = clone_and_rebind_expr(b.arena_mut(), cond, &self.map)?;
                let then = self.visit_branch(b, then)?;
                let otherwise = otherwise
                    .map(|s| self.visit_branch(b, s))
                    .transpose()?;
                let stmt = b.arena_mut().if_stmt(cond, then, otherwise);
                b.add_to_current_block(stmt);
            }
            StmtKind::Null => {}
        }
        Ok(())
    }

    /// Derivative declarations are emitted before the values they track.
    fn visit_decls(&mut self, b: &mut Builder<'_, '_>, decls: Vec<DeclId>) -> Result<(), DiffError> {
        let mut values = Vec::new();
        let mut derivatives = Vec::new();
        for original in decls {
            let decl = b.arena().decl(original).clone();
            let DeclKind::Var { init } = decl.kind else {
                continue;
            };
            let diff = init.map(|e| self.visit_expr(b, e)).transpose()?;
            if decl.ty.is_arithmetic() {
                let init = match diff {
                    Some(diff) => diff.derivative,
                    None => b.zero_init(&decl.ty),
                };
                let bind_ref = matches!(decl.ty, Type::Reference(_))
                    && b.ctx().oracle().is_modifiable_lvalue(b.arena(), init);
                let ty = if bind_ref {
                    decl.ty.clone()
                } else {
                    decl.ty.non_reference().clone()
                };
                let d = b.build_var_prefixed(ty, &format!("_d_{}", decl.name), Some(init));
                self.derivs.insert(original, d);
                derivatives.push(d);
            } else if has_tangent_array(&decl.ty) {
                let init = match diff {
                    Some(diff) if !b.is_zero(diff.derivative) => diff.derivative,
                    _ => b.zero_init(&decl.ty),
                };
                let d = b.build_var_prefixed(decl.ty.clone(), &format!("_d_{}", decl.name), Some(init));
                self.arrays.insert(original, d);
                derivatives.push(d);
            }
            let copy = b.build_var(decl.ty.clone(), &decl.name, diff.map(|d| d.value));
            self.map.insert(original, copy);
            values.push(copy);
        }
        for group in [derivatives, values] {
            if !group.is_empty() {
                let stmt = b.build_decl_stmt(group);
                b.add_to_current_block(stmt);
            }
        }
        Ok(())
    }

    fn zero_of(&self, b: &mut Builder<'_, '_>, value: ExprId) -> ExprId {
        let ty = b.type_of(value);
        b.zero_init(&ty)
    }

    /// Copy of `expr` with a zero tangent.
    fn non_differentiable(&self, b: &mut Builder<'_, '_>, expr: ExprId) -> Result<ExprDiff, DiffError> {
        let value = clone_and_rebind_expr(b.arena_mut(), expr, &self.map)?;
        let derivative = self.zero_of(b, value);
        Ok(ExprDiff { value, derivative })
    }

    fn unsupported(&mut self, b: &mut Builder<'_, '_>, expr: ExprId, what: String) -> Result<ExprDiff, DiffError> {
        let span = b.arena().expr(expr).span;
        self.sink.report(
            Diagnostic::warning(
                "W2003",
                format!("{what} is not supported in forward mode; its derivative is taken as zero"),
            )
            .with_span(span),
        );
        self.non_differentiable(b, expr)
    }

    fn visit_expr(&mut self, b: &mut Builder<'_, '_>, expr: ExprId) -> Result<ExprDiff, DiffError> {
        match b.arena().kind(expr).clone() {
            ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::StrLit(_)
            | ExprKind::DefaultArg => self.non_differentiable(b, expr),
            ExprKind::InitList(items) => {
                let diffs = items
                    .iter()
                    .map(|item| self.visit_expr(b, *item))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = b.arena_mut().init_list(diffs.iter().map(|d| d.value).collect());
                let derivative = if diffs.iter().all(|d| b.is_zero(d.derivative)) {
                    b.arena_mut().init_list(Vec::new())
                } else {
                    b.arena_mut().init_list(diffs.iter().map(|d| d.derivative).collect())
                };
                Ok(ExprDiff { value, derivative })
            }
            ExprKind::DeclRef(decl) => {
                let target = self.map.resolve(b.arena(), decl)?;
                let value = b.build_decl_ref(target);
                let derivative = match self.derivs.get(&decl) {
                    Some(d) => b.build_decl_ref(*d),
                    None => self.zero_of(b, value),
                };
                Ok(ExprDiff { value, derivative })
            }
            ExprKind::Paren(inner) => {
                let diff = self.visit_expr(b, inner)?;
                let value = b.arena_mut().paren(diff.value);
                let derivative = b.build_parens(diff.derivative);
                Ok(ExprDiff { value, derivative })
            }
            ExprKind::ImplicitCast { ty, expr: inner } => {
                let diff = self.visit_expr(b, inner)?;
                let value = b.arena_mut().cast(ty.clone(), diff.value);
                let derivative = if b.is_zero(diff.derivative) {
                    b.zero_init(&ty)
                } else if ty.is_arithmetic() {
                    b.build_cast(ty, diff.derivative)
                } else {
                    diff.derivative
                };
                Ok(ExprDiff { value, derivative })
            }
            ExprKind::Unary { op, operand } => self.visit_unary(b, expr, op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.visit_binary(b, expr, op, lhs, rhs),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => self.visit_conditional(b, cond, then, otherwise),
            ExprKind::Call {
                callee: Callee::Function(function),
                args,
            } => self.visit_call(b, expr, function, &args),
            ExprKind::Call {
                callee: Callee::Method { name, .. },
                ..
            } => self.unsupported(b, expr, format!("method call '{name}'")),
            ExprKind::Subscript { .. } => self.visit_subscript(b, expr),
        }
    }

    /// Temporaries a branch needs must only run when that branch is taken.
    /// If either branch emits statements, `c ? a : b` is lowered to an `if`
    /// that assigns the value and tangent temporaries.
    fn visit_conditional(
        &mut self,
        b: &mut Builder<'_, '_>,
        cond: ExprId,
        then: ExprId,
        otherwise: ExprId,
    ) -> Result<ExprDiff, DiffError> {
        let cond = clone_and_rebind_expr(b.arena_mut(), cond, &self.map)?;
        let cond = b.store_and_ref(cond, "_t", false);
        let (then, then_block) = b.in_block(|b| self.visit_expr(b, then));
        let then = then?;
        let (otherwise, otherwise_block) = b.in_block(|b| self.visit_expr(b, otherwise));
        let otherwise = otherwise?;

        if is_empty_block(b, then_block) && is_empty_block(b, otherwise_block) {
            let value = b.build_conditional(cond, then.value, otherwise.value);
            let derivative = if b.is_zero(then.derivative) && b.is_zero(otherwise.derivative) {
                self.zero_of(b, value)
            } else {
                let cond = clone_expr(b.arena_mut(), cond);
                b.build_conditional(cond, then.derivative, otherwise.derivative)
            };
            return Ok(ExprDiff { value, derivative });
        }

        let then_ty = b.type_of(then.value);
        let otherwise_ty = b.type_of(otherwise.value);
        let ty = common_arithmetic(&then_ty, &otherwise_ty).unwrap_or(then_ty);
        let value_var = b.build_var_prefixed(ty.clone(), "_t", None);
        let tangent_var = b.build_var_prefixed(ty, "_t", None);
        let decls = b.build_decl_stmt(vec![value_var, tangent_var]);
        b.add_to_current_block(decls);
        let then_block = assign_branch_results(b, then_block, then, value_var, tangent_var);
        let otherwise_block = assign_branch_results(b, otherwise_block, otherwise, value_var, tangent_var);
        let stmt = b.arena_mut().if_stmt(cond, then_block, Some(otherwise_block));
        b.add_to_current_block(stmt);
        Ok(ExprDiff {
            value: b.build_decl_ref(value_var),
            derivative: b.build_decl_ref(tangent_var),
        })
    }

    fn visit_unary(
        &mut self,
        b: &mut Builder<'_, '_>,
        expr: ExprId,
        op: UnaryOp,
        operand: ExprId,
    ) -> Result<ExprDiff, DiffError> {
        match op {
            UnaryOp::Plus | UnaryOp::Minus => {
                let diff = self.visit_expr(b, operand)?;
                let value = b.build_unary(op, diff.value);
                let derivative = if op == UnaryOp::Minus && !b.is_zero(diff.derivative) {
                    b.build_unary(UnaryOp::Minus, diff.derivative)
                } else {
                    diff.derivative
                };
                Ok(ExprDiff { value, derivative })
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let diff = self.visit_expr(b, operand)?;
                let value = b.build_unary(op, diff.value);
                Ok(ExprDiff {
                    value,
                    derivative: diff.derivative,
                })
            }
            UnaryOp::Not | UnaryOp::BitNot => self.non_differentiable(b, expr),
            UnaryOp::Deref | UnaryOp::AddrOf => {
                self.unsupported(b, expr, format!("operator '{}'", op.symbol()))
            }
        }
    }

    fn visit_binary(
        &mut self,
        b: &mut Builder<'_, '_>,
        expr: ExprId,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<ExprDiff, DiffError> {
        if op.is_comparison() || op.is_logical() {
            return self.non_differentiable(b, expr);
        }
        if op.is_assignment() {
            return self.visit_assignment(b, op, lhs, rhs);
        }
        match op {
            BinOp::Add | BinOp::Sub => {
                let l = self.visit_expr(b, lhs)?;
                let r = self.visit_expr(b, rhs)?;
                let value = b.build_binary(op, l.value, r.value);
                let derivative = rules::sum(b, op, l.derivative, r.derivative, value);
                Ok(ExprDiff { value, derivative })
            }
            BinOp::Mul | BinOp::Div => {
                let l = self.visit_expr(b, lhs)?;
                let r = self.visit_expr(b, rhs)?;
                let dl_zero = b.is_zero(l.derivative);
                let dr_zero = b.is_zero(r.derivative);
                // Each operand is stored only if the derivative refers to it.
                let ls = if dr_zero {
                    l.value
                } else {
                    b.store_and_ref(l.value, "_t", false)
                };
                let rs = if dl_zero && (op == BinOp::Mul || dr_zero) {
                    r.value
                } else {
                    b.store_and_ref(r.value, "_t", false)
                };
                let value = b.build_binary(op, ls, rs);
                let derivative = if op == BinOp::Mul {
                    rules::product(b, ls, l.derivative, rs, r.derivative, value)
                } else {
                    rules::quotient(b, ls, l.derivative, rs, r.derivative, value)
                };
                Ok(ExprDiff { value, derivative })
            }
            _ => self.unsupported(b, expr, format!("operator '{}'", op.symbol())),
        }
    }

    /// The tangent assignment mirrors the value assignment on the `_d_`
    /// variable or tangent array element. Targets whose tangent is not an
    /// lvalue get no tangent update.
    fn visit_assignment(
        &mut self,
        b: &mut Builder<'_, '_>,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<ExprDiff, DiffError> {
        let l = self.visit_expr(b, lhs)?;
        let r = self.visit_expr(b, rhs)?;
        let tracked = b.ctx().oracle().is_modifiable_lvalue(b.arena(), l.derivative);
        match op {
            BinOp::MulAssign | BinOp::DivAssign if tracked => {
                let rs = b.store_and_ref(r.value, "_t", false);
                let value = b.build_binary(op, l.value, rs);
                let current = clone_expr(b.arena_mut(), l.value);
                let dl = clone_expr(b.arena_mut(), l.derivative);
                let tangent = if op == BinOp::MulAssign {
                    rules::product(b, current, dl, rs, r.derivative, current)
                } else {
                    rules::quotient(b, current, dl, rs, r.derivative, current)
                };
                let derivative = b.build_binary(BinOp::Assign, l.derivative, tangent);
                Ok(ExprDiff { value, derivative })
            }
            _ => {
                let value = b.build_binary(op, l.value, r.value);
                let derivative = if tracked && !(b.is_zero(r.derivative) && op != BinOp::Assign) {
                    b.build_binary(op, l.derivative, r.derivative)
                } else {
                    l.derivative
                };
                Ok(ExprDiff { value, derivative })
            }
        }
    }

    fn visit_subscript(&mut self, b: &mut Builder<'_, '_>, expr: ExprId) -> Result<ExprDiff, DiffError> {
        let (base, indices) = b.split_array_subscript(expr);
        let base_decl = b.arena().referenced_decl(base);
        let base_value = clone_and_rebind_expr(b.arena_mut(), base, &self.map)?;
        let index_values = indices
            .iter()
            .map(|i| clone_and_rebind_expr(b.arena_mut(), *i, &self.map))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(tangent) = base_decl.and_then(|decl| self.arrays.get(&decl)).copied() {
            // One evaluation of each index serves the value and its tangent.
            let indices: Vec<ExprId> = index_values
                .into_iter()
                .map(|i| b.store_and_ref(i, "_t", false))
                .collect();
            let value = b.build_array_subscript(base_value, &indices);
            let tangent_base = b.build_decl_ref(tangent);
            let tangent_indices: Vec<ExprId> = indices
                .iter()
                .map(|i| clone_expr(b.arena_mut(), *i))
                .collect();
            let derivative = b.build_array_subscript(tangent_base, &tangent_indices);
            return Ok(ExprDiff { value, derivative });
        }

        let Independent::Element { array, index } = self.independent else {
            let value = b.build_array_subscript(base_value, &index_values);
            let derivative = self.zero_of(b, value);
            return Ok(ExprDiff { value, derivative });
        };
        if base_decl != Some(array) || index_values.len() != 1 {
            let value = b.build_array_subscript(base_value, &index_values);
            let derivative = self.zero_of(b, value);
            return Ok(ExprDiff { value, derivative });
        }

        let idx = b.store_and_ref(index_values[0], "_t", false);
        let value = b.build_array_subscript(base_value, &[idx]);
        let elem_ty = b.type_of(value);
        // `a[i]` has tangent `(i == k)` with respect to `a[k]`.
        let derivative = match fold::eval_int(b.arena(), idx) {
            Some(constant) => b.literal(&elem_ty, i64::from(constant == index as i64)),
            None => {
                let idx = clone_expr(b.arena_mut(), idx);
                let k = b.literal(&Type::Int, index as i64);
                let selected = b.build_binary(BinOp::Eq, idx, k);
                b.build_cast(elem_ty, selected)
            }
        };
        Ok(ExprDiff { value, derivative })
    }

    /// Whether `expr` names the independent array other than through an
    /// element access.
    fn mentions_independent_array(&self, b: &Builder<'_, '_>, expr: ExprId) -> bool {
        let Independent::Element { array, .. } = self.independent else {
            return false;
        };
        let arena = b.arena();
        match arena.kind(expr) {
            ExprKind::DeclRef(decl) => *decl == array,
            ExprKind::Paren(inner) | ExprKind::ImplicitCast { expr: inner, .. } => {
                self.mentions_independent_array(b, *inner)
            }
            ExprKind::Unary { operand, .. } => self.mentions_independent_array(b, *operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.mentions_independent_array(b, *lhs) || self.mentions_independent_array(b, *rhs)
            }
            ExprKind::Subscript { index, .. } => self.mentions_independent_array(b, *index),
            _ => false,
        }
    }

    /// Custom derivative, then the symbolic rule table, then the numerical
    /// fallback.
    fn visit_call(
        &mut self,
        b: &mut Builder<'_, '_>,
        expr: ExprId,
        function: DeclId,
        args: &[ExprId],
    ) -> Result<ExprDiff, DiffError> {
        let name = b.unit().name(function).to_string();
        let span = b.arena().expr(expr).span;
        let diffs = args
            .iter()
            .map(|a| self.visit_expr(b, *a))
            .collect::<Result<Vec<_>, _>>()?;
        let needed: Vec<bool> = args
            .iter()
            .zip(&diffs)
            .map(|(arg, diff)| !b.is_zero(diff.derivative) || self.mentions_independent_array(b, *arg))
            .collect();

        if !needed.iter().any(|n| *n) {
            let values = diffs.iter().map(|d| d.value).collect();
            let value = b.build_call_to_function(function, values);
            let derivative = self.zero_of(b, value);
            return Ok(ExprDiff { value, derivative });
        }

        let values: Vec<ExprId> = diffs
            .iter()
            .map(|d| b.store_and_ref(d.value, "_t", false))
            .collect();
        let value = b.build_call_to_function(function, values.clone());

        let custom_ns = b.ctx().options().custom_derivatives_namespace.clone();
        let mut custom_args: Vec<ExprId> = values
            .iter()
            .map(|v| clone_expr(b.arena_mut(), *v))
            .collect();
        custom_args.extend(diffs.iter().map(|d| d.derivative));
        if let Some(derivative) =
            b.build_call_by_name(&format!("{name}_pushforward"), Some(&custom_ns), custom_args)
        {
            log::debug!("using custom derivative {custom_ns}::{name}_pushforward");
            return Ok(ExprDiff { value, derivative });
        }

        if let ([arg], [diff]) = (values.as_slice(), diffs.as_slice()) {
            let value = if rules::uses_call_value(&name) {
                b.store_and_ref(value, "_t", false)
            } else {
                value
            };
            if let Some(derivative) = rules::apply_call_rule(b, &name, *arg, value, diff.derivative) {
                return Ok(ExprDiff { value, derivative });
            }
        }

        if !b.ctx().options().numerical_fallback {
            self.sink.report(
                Diagnostic::warning(
                    "W2002",
                    format!(
                        "Numerical differentiation is disabled; the derivative of '{name}' is taken as zero"
                    ),
                )
                .with_span(span),
            );
            let derivative = self.zero_of(b, value);
            return Ok(ExprDiff { value, derivative });
        }

        self.sink.report(
            Diagnostic::warning(
                "W2001",
                format!(
                    "Falling back to numerical differentiation for '{name}' since no suitable overload was found and it could not be derived symbolically"
                ),
            )
            .with_span(span)
            .with_help(format!(
                "declare '{custom_ns}::{name}_pushforward' or set `numerical_fallback = false` to disable this"
            )),
        );
        log::debug!("numerical fallback for '{name}'");

        let mut terms = Vec::new();
        for (position, _) in needed.iter().enumerate().filter(|(_, n)| **n) {
            let function_ref = b.build_decl_ref(function);
            let target = clone_expr(b.arena_mut(), values[position]);
            let all_args: Vec<ExprId> = values
                .iter()
                .map(|v| clone_expr(b.arena_mut(), *v))
                .collect();
            let Some(call) =
                numdiff::single_arg_central_diff_call(b, function_ref, target, position, &all_args)?
            else {
                let ty = b.type_of(values[position]);
                let err = DiffError::UnsupportedFallback {
                    function: name,
                    position,
                    ty: ty.to_string(),
                };
                self.sink
                    .report(Diagnostic::error("E2101", err.to_string()).with_span(span));
                return Err(err);
            };
            let tangent = diffs[position].derivative;
            if !b.is_zero(tangent) {
                terms.push(b.build_binary(BinOp::Mul, call, tangent));
            }
        }
        let derivative = match terms.into_iter().reduce(|acc, t| b.build_binary(BinOp::Add, acc, t)) {
            Some(sum) => sum,
            None => self.zero_of(b, value),
        };
        Ok(ExprDiff { value, derivative })
    }
}

fn is_empty_block(b: &Builder<'_, '_>, block: StmtId) -> bool {
    matches!(&b.arena().stmt(block).kind, StmtKind::Compound(stmts) if stmts.is_empty())
}

/// Append `tangent = derivative; value = value;` to a lowered branch.
fn assign_branch_results(
    b: &mut Builder<'_, '_>,
    block: StmtId,
    diff: ExprDiff,
    value_var: DeclId,
    tangent_var: DeclId,
) -> StmtId {
    let mut stmts = match &b.arena().stmt(block).kind {
        StmtKind::Compound(stmts) => stmts.clone(),
        _ => vec![block],
    };
    for (var, expr) in [(tangent_var, diff.derivative), (value_var, diff.value)] {
        let target = b.build_decl_ref(var);
        let assign = b.build_binary(BinOp::Assign, target, expr);
        stmts.push(b.arena_mut().expr_stmt(assign));
    }
    b.arena_mut().compound(stmts)
}
