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

//! Integer constant folding and literal synthesis.
//!
//! The engine only folds what it must: integer literal pairs produced while
//! assembling derivatives (`0 + 0`), and integer constant expressions used
//! as selectors. Anything involving a variable is left alone.

use crate::ast::{Arena, BinOp, ExprId, ExprKind, UnaryOp};
use crate::types::Type;

/// Evaluate an integer constant expression.
pub fn eval_int(arena: &Arena, expr: ExprId) -> Option<i64> {
    match arena.kind(expr) {
        ExprKind::IntLit(v) => Some(*v),
        ExprKind::Paren(inner) => eval_int(arena, *inner),
        ExprKind::ImplicitCast { ty, expr } if ty.is_integral() => eval_int(arena, *expr),
        ExprKind::Unary { op, operand } => {
            let v = eval_int(arena, *operand)?;
            match op {
                UnaryOp::Plus => Some(v),
                UnaryOp::Minus => v.checked_neg(),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let a = eval_int(arena, *lhs)?;
            let b = eval_int(arena, *rhs)?;
            apply(*op, a, b)
        }
        _ => None,
    }
}

fn apply(op: BinOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                None
            } else {
                a.checked_div(b)
            }
        }
        _ => None,
    }
}

/// Integer literal `value` converted to `ty`.
pub fn synthesize_literal(arena: &mut Arena, ty: &Type, value: i64) -> ExprId {
    let lit = arena.int(value);
    let ty = ty.non_reference();
    if ty.is_arithmetic() && *ty != Type::Int {
        arena.cast(ty.clone(), lit)
    } else {
        lit
    }
}

/// Literal zero (integer, floating, or an empty aggregate initializer).
pub fn is_zero(arena: &Arena, expr: ExprId) -> bool {
    match arena.kind(arena.ignore_paren_imp_casts(expr)) {
        ExprKind::IntLit(0) => true,
        ExprKind::FloatLit(v) => *v == 0.0,
        ExprKind::InitList(items) => items.is_empty(),
        _ => false,
    }
}

/// Fold `lhs op rhs` when both sides are integer constants.
pub fn fold_binary(arena: &mut Arena, op: BinOp, lhs: ExprId, rhs: ExprId) -> Option<ExprId> {
    let a = eval_int(arena, lhs)?;
    let b = eval_int(arena, rhs)?;
    let v = apply(op, a, b)?;
    Some(arena.int(v))
}

/// Fold constant integer subtrees bottom-up. Nodes are only rebuilt when a
/// child changed.
pub fn fold(arena: &mut Arena, expr: ExprId) -> ExprId {
    match arena.kind(expr).clone() {
        ExprKind::Binary { op, lhs, rhs } => {
            let l = fold(arena, lhs);
            let r = fold(arena, rhs);
            if let Some(folded) = fold_binary(arena, op, l, r) {
                return folded;
            }
            if l == lhs && r == rhs {
                expr
            } else {
                let span = arena.expr(expr).span;
                arena.add_expr(ExprKind::Binary { op, lhs: l, rhs: r }, span)
            }
        }
        ExprKind::Paren(inner) => {
            let f = fold(arena, inner);
            if matches!(arena.kind(f), ExprKind::IntLit(_)) {
                f
            } else if f == inner {
                expr
            } else {
                arena.paren(f)
            }
        }
        _ => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_integer_subtrees_only() {
        let mut arena = Arena::new();
        let two = arena.int(2);
        let three = arena.int(3);
        let product = arena.binary(BinOp::Mul, two, three);
        let x = arena.var("x", Type::Double, None);
        let xr = arena.decl_ref(x);
        let sum = arena.binary(BinOp::Add, xr, product);

        let folded = fold(&mut arena, sum);
        match arena.kind(folded) {
            ExprKind::Binary { lhs, rhs, .. } => {
                assert_eq!(*lhs, xr);
                assert_eq!(arena.kind(*rhs), &ExprKind::IntLit(6));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut arena = Arena::new();
        let one = arena.int(1);
        let zero = arena.int(0);
        let div = arena.binary(BinOp::Div, one, zero);
        assert_eq!(fold(&mut arena, div), div);
        assert_eq!(eval_int(&arena, div), None);
    }

    #[test]
    fn literal_zero_is_converted_to_target_type() {
        let mut arena = Arena::new();
        let z = synthesize_literal(&mut arena, &Type::Double, 0);
        assert!(matches!(arena.kind(z), ExprKind::ImplicitCast { ty: Type::Double, .. }));
        assert!(is_zero(&arena, z));
        let i = synthesize_literal(&mut arena, &Type::Int, 0);
        assert_eq!(arena.kind(i), &ExprKind::IntLit(0));
    }

    #[test]
    fn negative_constants_evaluate() {
        let mut arena = Arena::new();
        let four = arena.int(4);
        let neg = arena.unary(UnaryOp::Minus, four);
        let paren = arena.paren(neg);
        assert_eq!(eval_int(&arena, paren), Some(-4));
    }
}
