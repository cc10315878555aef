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

//! Synthesis of push/pop/peek sequences over the library `tape<T>`.

use crate::ast::{DeclId, ExprId, StmtId};
use crate::builder::Builder;
use crate::error::InternalError;
use crate::types::Type;

/// Statements recording one value: the `push` to emit in program order and
/// the matching `pop` for the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapeRecord {
    pub tape: DeclId,
    pub push: ExprId,
    pub pop: ExprId,
}

pub struct TapeBuilder<'b, 'u, 'c> {
    builder: &'b mut Builder<'u, 'c>,
}

impl<'b, 'u, 'c> TapeBuilder<'b, 'u, 'c> {
    pub fn new(builder: &'b mut Builder<'u, 'c>) -> Self {
        Self { builder }
    }

    /// `library::tape<elem>`.
    pub fn tape_type(&self, elem: Type) -> Result<Type, InternalError> {
        let ctx = self.builder.ctx();
        ctx.tape_of(self.builder.unit(), elem)
    }

    /// Declare `library::tape<elem> _tN = {};` and return the declaration
    /// with its statement. The statement is not added to any block.
    pub fn declare_tape(&mut self, elem: Type) -> Result<(DeclId, StmtId), InternalError> {
        let ty = self.tape_type(elem)?;
        let init = self.builder.zero_init(&ty);
        let tape = self.builder.build_var_prefixed(ty, "_t", Some(init));
        let stmt = self.builder.build_decl_stmt(vec![tape]);
        log::debug!("declared tape '{}'", self.builder.unit().name(tape));
        Ok((tape, stmt))
    }

    fn library_call(&mut self, function: DeclId, tape: DeclId, extra: Option<ExprId>) -> ExprId {
        let tape_ref = self.builder.build_decl_ref(tape);
        let mut args = vec![tape_ref];
        args.extend(extra);
        self.builder.build_call_to_function(function, args)
    }

    /// `library::push(tape, value)`.
    pub fn push(&mut self, tape: DeclId, value: ExprId) -> Result<ExprId, InternalError> {
        let push = self.builder.ctx().tape_push(self.builder.unit())?;
        Ok(self.library_call(push, tape, Some(value)))
    }

    /// `library::pop(tape)`.
    pub fn pop(&mut self, tape: DeclId) -> Result<ExprId, InternalError> {
        let pop = self.builder.ctx().tape_pop(self.builder.unit())?;
        Ok(self.library_call(pop, tape, None))
    }

    /// `library::back(tape)`; inspects the top without removing it.
    pub fn peek(&mut self, tape: DeclId) -> Result<ExprId, InternalError> {
        let back = self.builder.ctx().tape_back(self.builder.unit())?;
        Ok(self.library_call(back, tape, None))
    }

    /// Push `value` onto `tape` and build the pop that later yields it.
    pub fn record(&mut self, tape: DeclId, value: ExprId) -> Result<TapeRecord, InternalError> {
        let push = self.push(tape, value)?;
        let pop = self.pop(tape)?;
        Ok(TapeRecord { tape, push, pop })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Callee, ExprKind, TranslationUnit};
    use crate::config::DiffOptions;
    use crate::context::{install_runtime_library, DiffContext};

    #[test]
    fn record_pairs_push_with_pop() {
        let mut unit = TranslationUnit::new();
        install_runtime_library(&mut unit, &DiffOptions::default());
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let value = b.literal(&Type::Double, 3);
        let mut tapes = TapeBuilder::new(&mut b);
        let (tape, _) = tapes.declare_tape(Type::Double).expect("tape");
        let rec = tapes.record(tape, value).expect("record");
        let peek = tapes.peek(tape).expect("peek");

        let arena = b.arena();
        let callee_name = |e: ExprId| match arena.kind(e) {
            ExprKind::Call {
                callee: Callee::Function(f),
                ..
            } => b.unit().name(*f).to_string(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(callee_name(rec.push), "push");
        assert_eq!(callee_name(rec.pop), "pop");
        assert_eq!(callee_name(peek), "back");
        assert_eq!(b.type_of(rec.pop), Type::Double);
        assert_eq!(b.unit().name(tape), "_t0");
    }

    #[test]
    fn tape_requires_runtime_library() {
        let mut unit = TranslationUnit::new();
        let ctx = DiffContext::default();
        let mut b = Builder::new(&mut unit, &ctx);
        let tapes = TapeBuilder::new(&mut b);
        assert!(matches!(
            tapes.tape_type(Type::Double),
            Err(InternalError::MissingLibraryDecl(_))
        ));
    }
}
