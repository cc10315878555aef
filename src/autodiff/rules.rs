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

use crate::ast::{BinOp, ExprId, UnaryOp};
use crate::builder::Builder;
use crate::clone::clone_expr;
use crate::opt::fold;
use crate::types::Type;

// Helper API used by derivative rules.
pub(super) trait DerivativeOps {
    fn is_zero(&self, expr: ExprId) -> bool;
    fn type_of(&self, expr: ExprId) -> Type;
    fn zero(&mut self, ty: &Type) -> ExprId;
    fn literal(&mut self, ty: &Type, value: i64) -> ExprId;
    fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId;
    fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId;
    /// Fresh copy of an expression that is referenced once more.
    fn reuse(&mut self, expr: ExprId) -> ExprId;
    /// Call to a visible host function, if one matches.
    fn host_call(&mut self, name: &str, args: Vec<ExprId>) -> Option<ExprId>;
}

impl DerivativeOps for Builder<'_, '_> {
    fn is_zero(&self, expr: ExprId) -> bool {
        fold::is_zero(self.arena(), expr)
    }

    fn type_of(&self, expr: ExprId) -> Type {
        Builder::type_of(self, expr)
    }

    fn zero(&mut self, ty: &Type) -> ExprId {
        self.zero_init(ty)
    }

    fn literal(&mut self, ty: &Type, value: i64) -> ExprId {
        Builder::literal(self, ty, value)
    }

    fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.build_binary(op, lhs, rhs)
    }

    fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.build_unary(op, operand)
    }

    fn reuse(&mut self, expr: ExprId) -> ExprId {
        clone_expr(self.arena_mut(), expr)
    }

    fn host_call(&mut self, name: &str, args: Vec<ExprId>) -> Option<ExprId> {
        self.build_call_by_name(name, None, args)
    }
}

/// `dl + dr` / `dl - dr`, dropping literal zero terms. `value` supplies
/// the type when both sides vanish.
pub(super) fn sum(
    ops: &mut impl DerivativeOps,
    op: BinOp,
    dl: ExprId,
    dr: ExprId,
    value: ExprId,
) -> ExprId {
    match (ops.is_zero(dl), ops.is_zero(dr)) {
        (true, true) => {
            let ty = ops.type_of(value);
            ops.zero(&ty)
        }
        (false, true) => dl,
        (true, false) if op == BinOp::Add => dr,
        (true, false) => ops.unary(UnaryOp::Minus, dr),
        (false, false) => ops.binary(op, dl, dr),
    }
}

/// `dl * r + l * dr`. `l` and `r` must already be safe to repeat.
pub(super) fn product(
    ops: &mut impl DerivativeOps,
    l: ExprId,
    dl: ExprId,
    r: ExprId,
    dr: ExprId,
    value: ExprId,
) -> ExprId {
    let left = if ops.is_zero(dl) {
        dl
    } else {
        let r = ops.reuse(r);
        ops.binary(BinOp::Mul, dl, r)
    };
    let right = if ops.is_zero(dr) {
        dr
    } else {
        let l = ops.reuse(l);
        ops.binary(BinOp::Mul, l, dr)
    };
    sum(ops, BinOp::Add, left, right, value)
}

/// `(dl * r - l * dr) / (r * r)`.
pub(super) fn quotient(
    ops: &mut impl DerivativeOps,
    l: ExprId,
    dl: ExprId,
    r: ExprId,
    dr: ExprId,
    value: ExprId,
) -> ExprId {
    if ops.is_zero(dl) && ops.is_zero(dr) {
        let ty = ops.type_of(value);
        return ops.zero(&ty);
    }
    let left = if ops.is_zero(dl) {
        dl
    } else {
        let r = ops.reuse(r);
        ops.binary(BinOp::Mul, dl, r)
    };
    let right = if ops.is_zero(dr) {
        dr
    } else {
        let l = ops.reuse(l);
        ops.binary(BinOp::Mul, l, dr)
    };
    let numerator = sum(ops, BinOp::Sub, left, right, value);
    let r1 = ops.reuse(r);
    let r2 = ops.reuse(r);
    let denominator = ops.binary(BinOp::Mul, r1, r2);
    ops.binary(BinOp::Div, numerator, denominator)
}

/// Whether the rule for `name` is written in terms of the call's own value,
/// which should then be stored before the rule is applied.
pub(super) fn uses_call_value(name: &str) -> bool {
    matches!(name, "exp" | "sqrt")
}

/// Symbolic derivative of a known single-argument math function applied to
/// `arg`. `arg` and `value`, the call itself, must be safe to repeat. `None`
/// when the function is unknown or the host function the rule needs is not
/// declared.
pub(super) fn apply_call_rule(
    ops: &mut impl DerivativeOps,
    name: &str,
    arg: ExprId,
    value: ExprId,
    darg: ExprId,
) -> Option<ExprId> {
    let outer = match name {
        "sin" => {
            let x = ops.reuse(arg);
            ops.host_call("cos", vec![x])?
        }
        "cos" => {
            let x = ops.reuse(arg);
            let sin = ops.host_call("sin", vec![x])?;
            ops.unary(UnaryOp::Minus, sin)
        }
        "exp" => ops.reuse(value),
        "log" => {
            let x = ops.reuse(arg);
            return Some(ops.binary(BinOp::Div, darg, x));
        }
        "sqrt" => {
            let root = ops.reuse(value);
            let ty = ops.type_of(root);
            let two = ops.literal(&ty, 2);
            let twice = ops.binary(BinOp::Mul, two, root);
            return Some(ops.binary(BinOp::Div, darg, twice));
        }
        _ => return None,
    };
    Some(ops.binary(BinOp::Mul, outer, darg))
}
