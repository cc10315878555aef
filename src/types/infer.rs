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

//! Structural type inference over the arena.
//!
//! Good enough for the arithmetic subset the engine differentiates: usual
//! arithmetic conversions, boolean comparisons, element access, and return
//! types of declared functions (with naive instantiation of helpers whose
//! return type is a template parameter).

use crate::ast::{Arena, Callee, DeclKind, ExprId, ExprKind, UnaryOp};

use super::{Type, TypeOracle};

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOracle;

impl TypeOracle for StructuralOracle {
    fn type_of(&self, arena: &Arena, expr: ExprId) -> Type {
        infer_expr(arena, expr)
    }

    fn is_modifiable_lvalue(&self, arena: &Arena, expr: ExprId) -> bool {
        is_lvalue(arena, expr)
    }
}

/// Rank used for the usual arithmetic conversions.
fn rank(ty: &Type) -> u8 {
    match ty.non_reference() {
        Type::Double => 4,
        Type::Float => 3,
        Type::Int => 2,
        Type::Bool => 1,
        _ => 0,
    }
}

pub fn common_arithmetic(lhs: &Type, rhs: &Type) -> Option<Type> {
    if !lhs.is_arithmetic() || !rhs.is_arithmetic() {
        return None;
    }
    let widest = if rank(lhs) >= rank(rhs) { lhs } else { rhs };
    // bool promotes to int in arithmetic
    match widest.non_reference() {
        Type::Bool => Some(Type::Int),
        other => Some(other.clone()),
    }
}

pub fn infer_expr(arena: &Arena, expr: ExprId) -> Type {
    match arena.kind(expr) {
        ExprKind::IntLit(_) => Type::Int,
        ExprKind::FloatLit(_) => Type::Double,
        ExprKind::BoolLit(_) => Type::Bool,
        ExprKind::StrLit(_) => Type::pointer(Type::record("char")),
        ExprKind::DefaultArg | ExprKind::InitList(_) => Type::Void,
        ExprKind::DeclRef(decl) => arena.decl(*decl).ty.non_reference().clone(),
        ExprKind::Paren(inner) => infer_expr(arena, *inner),
        ExprKind::ImplicitCast { ty, .. } => ty.clone(),
        ExprKind::Unary { op, operand } => {
            let inner = infer_expr(arena, *operand);
            match op {
                UnaryOp::Not => Type::Bool,
                UnaryOp::Deref => inner.element_type().cloned().unwrap_or(Type::Void),
                UnaryOp::AddrOf => Type::pointer(inner),
                UnaryOp::BitNot if inner.is_integral() => Type::Int,
                _ => inner,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lt = infer_expr(arena, *lhs);
            if op.is_comparison() || op.is_logical() {
                return Type::Bool;
            }
            if op.is_assignment() {
                return lt;
            }
            let rt = infer_expr(arena, *rhs);
            common_arithmetic(&lt, &rt).unwrap_or(lt)
        }
        ExprKind::Conditional {
            then, otherwise, ..
        } => {
            let tt = infer_expr(arena, *then);
            let et = infer_expr(arena, *otherwise);
            common_arithmetic(&tt, &et).unwrap_or(tt)
        }
        ExprKind::Call { callee, args } => match callee {
            Callee::Function(decl) => match &arena.decl(*decl).kind {
                DeclKind::Function(func) => match &func.ret {
                    Type::Generic(_) => instantiate_from_first_arg(arena, args),
                    ret => ret.clone(),
                },
                _ => Type::Void,
            },
            Callee::Method { receiver, name } => {
                if name == "size" {
                    Type::Int
                } else {
                    infer_expr(arena, *receiver)
                }
            }
        },
        ExprKind::Subscript { base, .. } => {
            let bt = infer_expr(arena, *base);
            bt.element_type().cloned().unwrap_or(Type::Void)
        }
    }
}

/// `pop(tape<T>&)` style helpers return the first template argument of
/// their first argument's type.
fn instantiate_from_first_arg(arena: &Arena, args: &[ExprId]) -> Type {
    let Some(first) = args.first() else {
        return Type::Void;
    };
    match infer_expr(arena, *first) {
        Type::Named { args, .. } => args.into_iter().next().unwrap_or(Type::Void),
        other => other,
    }
}

pub fn is_lvalue(arena: &Arena, expr: ExprId) -> bool {
    match arena.kind(expr) {
        ExprKind::DeclRef(decl) => {
            let decl = arena.decl(*decl);
            matches!(
                decl.kind,
                DeclKind::Param | DeclKind::Field | DeclKind::Var { .. }
            ) && !matches!(decl.ty.non_reference(), Type::Array { .. })
        }
        ExprKind::Paren(inner) => is_lvalue(arena, *inner),
        ExprKind::Subscript { .. } => true,
        ExprKind::Unary { op, .. } => {
            matches!(op, UnaryOp::Deref | UnaryOp::PreInc | UnaryOp::PreDec)
        }
        ExprKind::Binary { op, .. } => op.is_assignment(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn mixed_arithmetic_widens() {
        let mut arena = Arena::new();
        let one = arena.int(1);
        let half = arena.float(0.5);
        let sum = arena.binary(BinOp::Add, one, half);
        assert_eq!(infer_expr(&arena, sum), Type::Double);

        let t = arena.boolean(true);
        let two = arena.int(2);
        let mixed = arena.binary(BinOp::Mul, t, two);
        assert_eq!(infer_expr(&arena, mixed), Type::Int);
    }

    #[test]
    fn comparisons_are_boolean() {
        let mut arena = Arena::new();
        let a = arena.float(1.0);
        let b = arena.float(2.0);
        let lt = arena.binary(BinOp::Lt, a, b);
        assert_eq!(infer_expr(&arena, lt), Type::Bool);
    }

    #[test]
    fn subscript_yields_element_and_is_lvalue() {
        let mut arena = Arena::new();
        let arr = arena.var("arr", Type::array(Type::Double, Some(4)), None);
        let base = arena.decl_ref(arr);
        let idx = arena.int(1);
        let access = arena.subscript(base, idx);
        assert_eq!(infer_expr(&arena, access), Type::Double);
        assert!(is_lvalue(&arena, access));
        assert!(!is_lvalue(&arena, base));
    }
}
