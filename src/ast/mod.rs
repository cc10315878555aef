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

//! Arena-backed host AST.
//!
//! Expressions, statements and declarations live in one [`Arena`] and refer
//! to each other through copyable handles. The builders never mutate an
//! original node in place: synthesized code is appended to the same arena,
//! so original and derivative functions can share leaves such as library
//! declarations.

mod unit;

use serde::Serialize;

use crate::types::Type;

pub use unit::TranslationUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(usize);

impl ExprId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl StmtId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl DeclId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Deref,
    AddrOf,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn is_increment_or_decrement(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
        }
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinOp::Assign | BinOp::AddAssign | BinOp::SubAssign | BinOp::MulAssign | BinOp::DivAssign
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Function(DeclId),
    Method { receiver: ExprId, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StrLit(String),
    /// A defaulted argument the caller did not spell out.
    DefaultArg,
    DeclRef(DeclId),
    Paren(ExprId),
    ImplicitCast { ty: Type, expr: ExprId },
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId },
    Conditional { cond: ExprId, then: ExprId, otherwise: ExprId },
    Call { callee: Callee, args: Vec<ExprId> },
    Subscript { base: ExprId, index: ExprId },
    InitList(Vec<ExprId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Compound(Vec<StmtId>),
    Decl(Vec<DeclId>),
    Expr(ExprId),
    Return(Option<ExprId>),
    If {
        cond: ExprId,
        then: StmtId,
        otherwise: Option<StmtId>,
    },
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub params: Vec<DeclId>,
    pub ret: Type,
    pub body: Option<StmtId>,
    /// Record whose call operator this function is.
    pub functor: Option<DeclId>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDecl {
    pub fields: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamespaceDecl {
    pub inline: bool,
    /// Earlier declaration of the same namespace, if any.
    pub previous: Option<DeclId>,
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Param,
    Field,
    Var { init: Option<ExprId> },
    Function(FunctionDecl),
    Record(RecordDecl),
    Namespace(NamespaceDecl),
    ClassTemplate { arity: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub ty: Type,
    pub kind: DeclKind,
    /// Enclosing namespace or record; `None` at translation-unit level.
    pub context: Option<DeclId>,
    pub span: Span,
}

impl Decl {
    pub fn as_function(&self) -> Option<&FunctionDecl> {
        match &self.kind {
            DeclKind::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&NamespaceDecl> {
        match &self.kind {
            DeclKind::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordDecl> {
        match &self.kind {
            DeclKind::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Param | DeclKind::Field | DeclKind::Var { .. }
        )
    }
}

/// Node storage shared by original and synthesized code.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    decls: Vec<Decl>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len());
        self.exprs.push(Expr { kind, span });
        id
    }

    pub fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId(self.stmts.len());
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len());
        self.decls.push(decl);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0]
    }

    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.exprs[id.0].kind
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Skip parentheses and implicit conversions.
    pub fn ignore_paren_imp_casts(&self, mut id: ExprId) -> ExprId {
        loop {
            match self.kind(id) {
                ExprKind::Paren(inner) | ExprKind::ImplicitCast { expr: inner, .. } => id = *inner,
                _ => return id,
            }
        }
    }

    /// Skip implicit conversions but keep parentheses.
    pub fn ignore_casts(&self, mut id: ExprId) -> ExprId {
        while let ExprKind::ImplicitCast { expr, .. } = self.kind(id) {
            id = *expr;
        }
        id
    }

    /// Declaration named by `id`, looking through parentheses and casts.
    pub fn referenced_decl(&self, id: ExprId) -> Option<DeclId> {
        match self.kind(self.ignore_paren_imp_casts(id)) {
            ExprKind::DeclRef(decl) => Some(*decl),
            _ => None,
        }
    }

    // Host-side constructors. The front-end builds original code through
    // these; the engine uses the type-aware versions on `Builder`.

    pub fn int(&mut self, value: i64) -> ExprId {
        self.add_expr(ExprKind::IntLit(value), Span::default())
    }

    pub fn float(&mut self, value: f64) -> ExprId {
        self.add_expr(ExprKind::FloatLit(value), Span::default())
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.add_expr(ExprKind::BoolLit(value), Span::default())
    }

    pub fn string(&mut self, value: impl Into<String>) -> ExprId {
        self.add_expr(ExprKind::StrLit(value.into()), Span::default())
    }

    pub fn default_arg(&mut self) -> ExprId {
        self.add_expr(ExprKind::DefaultArg, Span::default())
    }

    pub fn decl_ref(&mut self, decl: DeclId) -> ExprId {
        self.add_expr(ExprKind::DeclRef(decl), Span::default())
    }

    pub fn paren(&mut self, inner: ExprId) -> ExprId {
        self.add_expr(ExprKind::Paren(inner), Span::default())
    }

    pub fn cast(&mut self, ty: Type, expr: ExprId) -> ExprId {
        self.add_expr(ExprKind::ImplicitCast { ty, expr }, Span::default())
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.add_expr(ExprKind::Unary { op, operand }, Span::default())
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add_expr(ExprKind::Binary { op, lhs, rhs }, Span::default())
    }

    pub fn conditional(&mut self, cond: ExprId, then: ExprId, otherwise: ExprId) -> ExprId {
        self.add_expr(
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            },
            Span::default(),
        )
    }

    pub fn call(&mut self, function: DeclId, args: Vec<ExprId>) -> ExprId {
        self.add_expr(
            ExprKind::Call {
                callee: Callee::Function(function),
                args,
            },
            Span::default(),
        )
    }

    pub fn method_call(&mut self, receiver: ExprId, name: impl Into<String>, args: Vec<ExprId>) -> ExprId {
        self.add_expr(
            ExprKind::Call {
                callee: Callee::Method {
                    receiver,
                    name: name.into(),
                },
                args,
            },
            Span::default(),
        )
    }

    pub fn subscript(&mut self, base: ExprId, index: ExprId) -> ExprId {
        self.add_expr(ExprKind::Subscript { base, index }, Span::default())
    }

    pub fn init_list(&mut self, items: Vec<ExprId>) -> ExprId {
        self.add_expr(ExprKind::InitList(items), Span::default())
    }

    pub fn compound(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.add_stmt(StmtKind::Compound(stmts), Span::default())
    }

    pub fn decl_stmt(&mut self, decls: Vec<DeclId>) -> StmtId {
        self.add_stmt(StmtKind::Decl(decls), Span::default())
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.add_stmt(StmtKind::Expr(expr), Span::default())
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.add_stmt(StmtKind::Return(value), Span::default())
    }

    pub fn if_stmt(&mut self, cond: ExprId, then: StmtId, otherwise: Option<StmtId>) -> StmtId {
        self.add_stmt(
            StmtKind::If {
                cond,
                then,
                otherwise,
            },
            Span::default(),
        )
    }

    /// Local variable declaration, not yet attached to any statement.
    pub fn var(&mut self, name: impl Into<String>, ty: Type, init: Option<ExprId>) -> DeclId {
        self.add_decl(Decl {
            name: name.into(),
            ty,
            kind: DeclKind::Var { init },
            context: None,
            span: Span::default(),
        })
    }

    /// Attach `span` to an expression, builder style.
    pub fn with_span(&mut self, id: ExprId, span: Span) -> ExprId {
        self.expr_mut(id).span = span;
        id
    }

    pub fn var_init(&self, decl: DeclId) -> Option<ExprId> {
        match self.decl(decl).kind {
            DeclKind::Var { init } => init,
            _ => None,
        }
    }

    /// Every variable declared anywhere below `stmt`, in source order.
    pub fn declared_vars(&self, stmt: StmtId) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.collect_declared_vars(stmt, &mut out);
        out
    }

    fn collect_declared_vars(&self, stmt: StmtId, out: &mut Vec<DeclId>) {
        match &self.stmt(stmt).kind {
            StmtKind::Compound(children) => {
                for child in children {
                    self.collect_declared_vars(*child, out);
                }
            }
            StmtKind::Decl(decls) => out.extend(decls.iter().copied()),
            StmtKind::If {
                then, otherwise, ..
            } => {
                self.collect_declared_vars(*then, out);
                if let Some(otherwise) = otherwise {
                    self.collect_declared_vars(*otherwise, out);
                }
            }
            StmtKind::Expr(_) | StmtKind::Return(_) | StmtKind::Null => {}
        }
    }
}
