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

//! Store-or-inline decision for values the derivative refers to twice.

use crate::ast::{Arena, ExprId, ExprKind, UnaryOp};

/// Whether `expr` should be materialized in a temporary before it is
/// referenced again. Variable references and literals are free to repeat;
/// unary `+`/`-` inherit the decision of their operand; an element access
/// is worth storing when its base or index is. Everything else is stored.
pub fn useful_to_store(arena: &Arena, expr: ExprId) -> bool {
    let expr = arena.ignore_paren_imp_casts(expr);
    match arena.kind(expr) {
        ExprKind::DeclRef(_)
        | ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::StrLit(_) => false,
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Plus | UnaryOp::Minus => useful_to_store(arena, *operand),
            _ => false,
        },
        ExprKind::Subscript { base, index } => {
            useful_to_store(arena, *base) || useful_to_store(arena, *index)
        }
        _ => true,
    }
}
