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

//! Stable C-like rendering of original and synthesized code.

use std::fmt::Write;

use crate::ast::{Callee, DeclId, DeclKind, ExprId, ExprKind, StmtId, StmtKind, TranslationUnit};
use crate::types::Type;

const INDENT: &str = "    ";

/// Format a function declaration, with its body when it has one.
pub fn format_function(unit: &TranslationUnit, function: DeclId) -> String {
    let decl = unit.decl(function);
    let Some(func) = decl.as_function() else {
        return format!("{};\n", declarator(&decl.ty, &decl.name));
    };
    let params: Vec<String> = func
        .params
        .iter()
        .map(|p| declarator(&unit.decl(*p).ty, &unit.decl(*p).name))
        .collect();
    let mut out = String::new();
    write!(&mut out, "{} {}({})", func.ret, decl.name, params.join(", "))
        .expect("write to string cannot fail");
    match func.body {
        Some(body) => {
            out.push(' ');
            format_block(unit, body, 0, &mut out);
            out.push('\n');
        }
        None => out.push_str(";\n"),
    }
    out
}

/// Format one statement at top-level indentation.
pub fn format_stmt(unit: &TranslationUnit, stmt: StmtId) -> String {
    let mut out = String::new();
    write_stmt(unit, stmt, 0, &mut out);
    out
}

fn declarator(ty: &Type, name: &str) -> String {
    match ty {
        Type::Array { elem, len } => {
            let dims = len.map(|n| n.to_string()).unwrap_or_default();
            declarator(elem, &format!("{name}[{dims}]"))
        }
        other => format!("{other} {name}"),
    }
}

fn format_block(unit: &TranslationUnit, stmt: StmtId, depth: usize, out: &mut String) {
    match &unit.arena.stmt(stmt).kind {
        StmtKind::Compound(children) => {
            out.push_str("{\n");
            for child in children {
                write_stmt(unit, *child, depth + 1, out);
            }
            out.push_str(&INDENT.repeat(depth));
            out.push('}');
        }
        _ => {
            out.push_str("{\n");
            write_stmt(unit, stmt, depth + 1, out);
            out.push_str(&INDENT.repeat(depth));
            out.push('}');
        }
    }
}

fn write_stmt(unit: &TranslationUnit, stmt: StmtId, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    match &unit.arena.stmt(stmt).kind {
        StmtKind::Compound(_) => {
            out.push_str(&pad);
            format_block(unit, stmt, depth, out);
            out.push('\n');
        }
        StmtKind::Decl(decls) => {
            for decl in decls {
                let d = unit.decl(*decl);
                out.push_str(&pad);
                out.push_str(&declarator(&d.ty, &d.name));
                if let DeclKind::Var { init: Some(init) } = d.kind {
                    out.push_str(" = ");
                    out.push_str(&format_expr(unit, init));
                }
                out.push_str(";\n");
            }
        }
        StmtKind::Expr(expr) => {
            out.push_str(&format!("{pad}{};\n", format_expr(unit, *expr)));
        }
        StmtKind::Return(Some(expr)) => {
            out.push_str(&format!("{pad}return {};\n", format_expr(unit, *expr)));
        }
        StmtKind::Return(None) => out.push_str(&format!("{pad}return;\n")),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            out.push_str(&format!("{pad}if ({}) ", format_expr(unit, *cond)));
            format_block(unit, *then, depth, out);
            if let Some(otherwise) = otherwise {
                out.push_str(" else ");
                format_block(unit, *otherwise, depth, out);
            }
            out.push('\n');
        }
        StmtKind::Null => out.push_str(&format!("{pad};\n")),
    }
}

/// Format an expression. Implicit conversions are not spelled out and
/// defaulted arguments are omitted.
pub fn format_expr(unit: &TranslationUnit, expr: ExprId) -> String {
    match &unit.arena.kind(expr) {
        ExprKind::IntLit(v) => v.to_string(),
        ExprKind::FloatLit(v) => format!("{v:?}"),
        ExprKind::BoolLit(v) => v.to_string(),
        ExprKind::StrLit(s) => format!("{s:?}"),
        ExprKind::DefaultArg => String::new(),
        ExprKind::DeclRef(decl) => match unit.decl(*decl).kind {
            DeclKind::Function(_) => unit.qualified_name(*decl),
            _ => unit.name(*decl).to_string(),
        },
        ExprKind::Paren(inner) => format!("({})", format_expr(unit, *inner)),
        ExprKind::ImplicitCast { expr, .. } => format_expr(unit, *expr),
        ExprKind::Unary { op, operand } => {
            let operand = format_expr(unit, *operand);
            if op.is_postfix() {
                format!("{operand}{}", op.symbol())
            } else {
                format!("{}{operand}", op.symbol())
            }
        }
        ExprKind::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            format_expr(unit, *lhs),
            op.symbol(),
            format_expr(unit, *rhs)
        ),
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => format!(
            "{} ? {} : {}",
            format_expr(unit, *cond),
            format_expr(unit, *then),
            format_expr(unit, *otherwise)
        ),
        ExprKind::Call { callee, args } => {
            let args = format_args(unit, args);
            match callee {
                Callee::Function(f) => format!("{}({args})", unit.qualified_name(*f)),
                Callee::Method { receiver, name } => {
                    format!("{}.{name}({args})", format_expr(unit, *receiver))
                }
            }
        }
        ExprKind::Subscript { base, index } => {
            format!("{}[{}]", format_expr(unit, *base), format_expr(unit, *index))
        }
        ExprKind::InitList(items) => format!("{{{}}}", format_args(unit, items)),
    }
}

fn format_args(unit: &TranslationUnit, args: &[ExprId]) -> String {
    args.iter()
        .filter(|a| !matches!(unit.arena.kind(**a), ExprKind::DefaultArg))
        .map(|a| format_expr(unit, *a))
        .collect::<Vec<_>>()
        .join(", ")
}
