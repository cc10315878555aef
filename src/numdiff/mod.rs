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

//! Calls into the runtime central-difference helpers, used when a callee has
//! neither a symbolic rule nor a custom derivative.

use crate::ast::{DeclId, ExprId, StmtId};
use crate::builder::Builder;
use crate::context::{CENTRAL_DIFFERENCE, FORWARD_CENTRAL_DIFFERENCE};
use crate::error::InternalError;
use crate::lookup::lookup_qualified;
use crate::tape::TapeBuilder;
use crate::types::Type;

/// Pieces of a multi-argument central-difference call, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiArgCall {
    /// Tape declaration followed by one push per output slot.
    pub statements: Vec<StmtId>,
    pub call: ExprId,
    pub tape: DeclId,
}

fn helper(b: &Builder<'_, '_>, name: &str) -> Result<DeclId, InternalError> {
    let ns = &b.ctx().options().library_namespace;
    lookup_qualified(b.unit(), ns, name)
        .into_iter()
        .next()
        .ok_or_else(|| InternalError::MissingLibraryDecl(format!("{ns}::{name}")))
}

/// `forward_central_difference(fn, arg, position, print_error, args...)`.
///
/// Returns `Ok(None)` when `target_arg` is not arithmetic; the caller has
/// no numerical fallback in that case.
pub fn single_arg_central_diff_call(
    b: &mut Builder<'_, '_>,
    function_ref: ExprId,
    target_arg: ExprId,
    position: usize,
    args: &[ExprId],
) -> Result<Option<ExprId>, InternalError> {
    let target_ty = b.type_of(target_arg);
    if !b.ctx().oracle().is_arithmetic(&target_ty) {
        log::debug!("no numerical fallback for non-arithmetic argument of type '{target_ty}'");
        return Ok(None);
    }
    let helper = helper(b, FORWARD_CENTRAL_DIFFERENCE)?;
    let flag = b.ctx().options().print_flag();
    let mut call_args = vec![
        function_ref,
        target_arg,
        b.literal(&Type::Int, position as i64),
        b.literal(&Type::Int, flag),
    ];
    call_args.extend_from_slice(args);
    Ok(Some(b.build_call_to_function(helper, call_args)))
}

/// Tape of `array_ref<ret_ty>` output slots, one push per slot, then
/// `central_difference(fn, tape, print_error, args...)`.
pub fn multi_arg_central_diff_call(
    b: &mut Builder<'_, '_>,
    function_ref: ExprId,
    ret_ty: Type,
    args: &[ExprId],
    outputs: &[ExprId],
) -> Result<MultiArgCall, InternalError> {
    let helper = helper(b, CENTRAL_DIFFERENCE)?;
    let slot_ty = b.ctx().array_ref_of(b.unit(), ret_ty)?;
    let mut statements = Vec::with_capacity(outputs.len() + 1);

    let (tape, decl) = TapeBuilder::new(b).declare_tape(slot_ty)?;
    statements.push(decl);
    for output in outputs {
        let push = TapeBuilder::new(b).push(tape, *output)?;
        statements.push(b.arena_mut().expr_stmt(push));
    }

    let flag = b.ctx().options().print_flag();
    let tape_ref = b.build_decl_ref(tape);
    let mut call_args = vec![function_ref, tape_ref, b.literal(&Type::Int, flag)];
    call_args.extend_from_slice(args);
    let call = b.build_call_to_function(helper, call_args);
    log::debug!(
        "multi-argument numerical differentiation over {} slot(s)",
        outputs.len()
    );
    Ok(MultiArgCall {
        statements,
        call,
        tape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind, TranslationUnit};
    use crate::config::DiffOptions;
    use crate::context::{install_runtime_library, DiffContext};

    fn setup() -> TranslationUnit {
        let mut unit = TranslationUnit::new();
        install_runtime_library(&mut unit, &DiffOptions::default());
        unit
    }

    #[test]
    fn single_arg_declines_non_arithmetic_targets() {
        let mut unit = setup();
        let rec = unit.declare_record("Point", &[], None);
        let f = unit.declare_function("g", &[("p", Type::record("Point"))], Type::Double, None);
        let point = unit.decl(rec).ty.clone();
        let p = unit.arena.var("p", point, None);
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let fref = b.build_decl_ref(f);
        let pr = b.build_decl_ref(p);
        let call = single_arg_central_diff_call(&mut b, fref, pr, 0, &[pr]).expect("lookup");
        assert!(call.is_none());
    }

    #[test]
    fn single_arg_threads_position_and_flag() {
        let mut unit = setup();
        let f = unit.declare_function("g", &[("x", Type::Double)], Type::Double, None);
        let ctx = DiffContext::new(DiffOptions {
            print_num_diff_errors: true,
            ..DiffOptions::default()
        });
        let mut b = Builder::new(&mut unit, &ctx);
        let fref = b.build_decl_ref(f);
        let x = b.literal(&Type::Double, 2);
        let call = single_arg_central_diff_call(&mut b, fref, x, 0, &[x])
            .expect("lookup")
            .expect("arithmetic");
        match b.arena().kind(call) {
            ExprKind::Call { args, .. } => {
                assert_eq!(args.len(), 5);
                assert_eq!(args[0], fref);
                assert_eq!(b.arena().kind(args[2]), &ExprKind::IntLit(0));
                assert_eq!(b.arena().kind(args[3]), &ExprKind::IntLit(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn multi_arg_emits_declaration_then_pushes_in_order() {
        let mut unit = setup();
        let f = unit.declare_function(
            "h",
            &[("x", Type::Double), ("y", Type::Double)],
            Type::Double,
            None,
        );
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let fref = b.build_decl_ref(f);
        let g0 = b.build_var(Type::Double, "_grad0", None);
        let g1 = b.build_var(Type::Double, "_grad1", None);
        let outputs = [b.build_decl_ref(g0), b.build_decl_ref(g1)];
        let args = [b.literal(&Type::Double, 1), b.literal(&Type::Double, 2)];

        let multi = multi_arg_central_diff_call(&mut b, fref, Type::Double, &args, &outputs)
            .expect("library");
        assert_eq!(multi.statements.len(), 3);
        let arena = b.arena();
        assert!(matches!(arena.stmt(multi.statements[0]).kind, StmtKind::Decl(_)));
        for (stmt, output) in multi.statements[1..].iter().zip(outputs) {
            match &arena.stmt(*stmt).kind {
                StmtKind::Expr(push) => match arena.kind(*push) {
                    ExprKind::Call { args, .. } => assert_eq!(args[1], output),
                    other => panic!("unexpected {other:?}"),
                },
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            arena.decl(multi.tape).ty.to_string(),
            "srcdiff::tape<srcdiff::array_ref<double>>"
        );
        match arena.kind(multi.call) {
            ExprKind::Call { args, .. } => assert_eq!(args.len(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }
}
