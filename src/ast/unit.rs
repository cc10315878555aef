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

use super::{
    Arena, Decl, DeclId, DeclKind, FunctionDecl, NamespaceDecl, RecordDecl, Span, StmtId,
};
use crate::types::Type;

/// One compilation unit: the node arena plus the declarations that live at
/// translation-unit scope.
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    pub arena: Arena,
    top_level: Vec<DeclId>,
}

impl TranslationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_level(&self) -> &[DeclId] {
        &self.top_level
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        self.arena.decl(id)
    }

    pub fn name(&self, id: DeclId) -> &str {
        &self.arena.decl(id).name
    }

    /// Register `decl` as a member of `context` (a namespace) or of the
    /// translation unit when `context` is `None`.
    pub fn add_to_context(&mut self, context: Option<DeclId>, decl: DeclId) {
        self.arena.decl_mut(decl).context = context;
        match context {
            None => self.top_level.push(decl),
            Some(ctx) => match &mut self.arena.decl_mut(ctx).kind {
                DeclKind::Namespace(ns) => ns.members.push(decl),
                DeclKind::Record(record) => record.fields.push(decl),
                _ => {}
            },
        }
    }

    /// Direct members of `context`. Records expose their fields.
    pub fn members(&self, context: Option<DeclId>) -> &[DeclId] {
        match context {
            None => &self.top_level,
            Some(ctx) => match &self.arena.decl(ctx).kind {
                DeclKind::Namespace(ns) => &ns.members,
                DeclKind::Record(record) => &record.fields,
                _ => &[],
            },
        }
    }

    /// Every declaration of the namespace `ns`, newest first.
    pub fn namespace_chain(&self, ns: DeclId) -> Vec<DeclId> {
        let mut chain = vec![ns];
        let mut cursor = ns;
        while let Some(prev) = self.arena.decl(cursor).as_namespace().and_then(|n| n.previous) {
            chain.push(prev);
            cursor = prev;
        }
        chain
    }

    /// Most recent top-level or nested namespace named `name` inside `context`.
    pub fn find_namespace(&self, context: Option<DeclId>, name: &str) -> Option<DeclId> {
        let scopes = match context {
            Some(ctx) => self.namespace_chain(ctx),
            None => Vec::new(),
        };
        let candidates: Vec<DeclId> = if context.is_none() {
            self.top_level.clone()
        } else {
            scopes
                .iter()
                .flat_map(|ns| self.members(Some(*ns)).iter().copied())
                .collect()
        };
        candidates.into_iter().rev().find(|id| {
            let decl = self.arena.decl(*id);
            decl.name == name && decl.as_namespace().is_some()
        })
    }

    pub fn declare_namespace(&mut self, name: &str, inline: bool, context: Option<DeclId>) -> DeclId {
        let previous = self.find_namespace(context, name);
        let id = self.arena.add_decl(Decl {
            name: name.to_string(),
            ty: Type::Void,
            kind: DeclKind::Namespace(NamespaceDecl {
                inline,
                previous,
                members: Vec::new(),
            }),
            context,
            span: Span::default(),
        });
        self.add_to_context(context, id);
        id
    }

    /// Declare a function together with fresh parameter declarations.
    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
        context: Option<DeclId>,
    ) -> DeclId {
        let param_ids: Vec<DeclId> = params
            .iter()
            .map(|(pname, ty)| {
                self.arena.add_decl(Decl {
                    name: (*pname).to_string(),
                    ty: ty.clone(),
                    kind: DeclKind::Param,
                    context: None,
                    span: Span::default(),
                })
            })
            .collect();
        self.add_function(
            name,
            FunctionDecl {
                params: param_ids,
                ret,
                body: None,
                functor: None,
                variadic: false,
            },
            context,
        )
    }

    /// Install a function whose parameter declarations already exist.
    pub fn add_function(&mut self, name: &str, func: FunctionDecl, context: Option<DeclId>) -> DeclId {
        let ty = Type::Function {
            ret: Box::new(func.ret.clone()),
            params: func
                .params
                .iter()
                .map(|p| self.arena.decl(*p).ty.clone())
                .collect(),
        };
        let id = self.arena.add_decl(Decl {
            name: name.to_string(),
            ty,
            kind: DeclKind::Function(func),
            context,
            span: Span::default(),
        });
        self.add_to_context(context, id);
        id
    }

    pub fn set_body(&mut self, function: DeclId, body: StmtId) {
        if let DeclKind::Function(func) = &mut self.arena.decl_mut(function).kind {
            func.body = Some(body);
        }
    }

    pub fn set_variadic(&mut self, function: DeclId, variadic: bool) {
        if let DeclKind::Function(func) = &mut self.arena.decl_mut(function).kind {
            func.variadic = variadic;
        }
    }

    pub fn params(&self, function: DeclId) -> &[DeclId] {
        self.arena
            .decl(function)
            .as_function()
            .map(|f| f.params.as_slice())
            .unwrap_or(&[])
    }

    pub fn declare_record(&mut self, name: &str, fields: &[(&str, Type)], context: Option<DeclId>) -> DeclId {
        let id = self.arena.add_decl(Decl {
            name: name.to_string(),
            ty: Type::record(name),
            kind: DeclKind::Record(RecordDecl::default()),
            context,
            span: Span::default(),
        });
        self.add_to_context(context, id);
        for (fname, ty) in fields {
            let field = self.arena.add_decl(Decl {
                name: (*fname).to_string(),
                ty: ty.clone(),
                kind: DeclKind::Field,
                context: Some(id),
                span: Span::default(),
            });
            self.add_to_context(Some(id), field);
        }
        id
    }

    /// Declare the parameterless call operator of `record`.
    pub fn declare_call_operator(&mut self, record: DeclId, ret: Type) -> DeclId {
        self.arena.add_decl(Decl {
            name: "operator()".to_string(),
            ty: Type::Function {
                ret: Box::new(ret.clone()),
                params: Vec::new(),
            },
            kind: DeclKind::Function(FunctionDecl {
                params: Vec::new(),
                ret,
                body: None,
                functor: Some(record),
                variadic: false,
            }),
            context: Some(record),
            span: Span::default(),
        })
    }

    pub fn declare_class_template(&mut self, name: &str, arity: usize, context: Option<DeclId>) -> DeclId {
        let id = self.arena.add_decl(Decl {
            name: name.to_string(),
            ty: Type::Void,
            kind: DeclKind::ClassTemplate { arity },
            context,
            span: Span::default(),
        });
        self.add_to_context(context, id);
        id
    }

    /// Nearest enclosing namespace of `decl`, skipping records.
    pub fn enclosing_namespace(&self, decl: DeclId) -> Option<DeclId> {
        let mut cursor = self.arena.decl(decl).context;
        while let Some(ctx) = cursor {
            if self.arena.decl(ctx).as_namespace().is_some() {
                return Some(ctx);
            }
            cursor = self.arena.decl(ctx).context;
        }
        None
    }

    /// `a::b::name` spelling of `decl` through its namespace contexts.
    pub fn qualified_name(&self, decl: DeclId) -> String {
        let mut parts = vec![self.arena.decl(decl).name.clone()];
        let mut cursor = self.arena.decl(decl).context;
        while let Some(ctx) = cursor {
            let ctx_decl = self.arena.decl(ctx);
            if let Some(ns) = ctx_decl.as_namespace() {
                if !ns.inline && !ctx_decl.name.is_empty() {
                    parts.push(ctx_decl.name.clone());
                }
            }
            cursor = ctx_decl.context;
        }
        parts.reverse();
        parts.join("::")
    }
}
