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

//! Lexical scopes and identifier counters for one differentiation pass.
//!
//! Both tables live inside a [`Builder`](crate::builder::Builder) and die
//! with it: two requests never share counters.

use std::collections::HashMap;

use crate::ast::DeclId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Block,
    Namespace,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    bindings: HashMap<String, DeclId>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<DeclId> {
        self.bindings.get(name).copied()
    }
}

/// Open scopes, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind) {
        log::trace!("enter {kind:?} scope (depth {})", self.scopes.len() + 1);
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop(&mut self) -> Option<Scope> {
        let scope = self.scopes.pop();
        log::trace!("leave scope (depth {})", self.scopes.len());
        scope
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn innermost(&self) -> Option<&Scope> {
        self.scopes.last()
    }

    /// Bind `name` in the innermost scope. Outside any scope this is a no-op.
    pub fn declare(&mut self, name: &str, decl: DeclId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), decl);
        }
    }

    /// Innermost binding of `name` along the scope chain.
    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

/// Next free numeric suffix per name prefix. Counters only grow.
#[derive(Debug, Clone, Default)]
pub struct IdentCounters {
    counters: HashMap<String, usize>,
}

impl IdentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `prefix`, then advance it.
    pub fn next(&mut self, prefix: &str) -> usize {
        let slot = self.counters.entry(prefix.to_string()).or_insert(0);
        let value = *slot;
        *slot += 1;
        value
    }

    pub fn peek(&self, prefix: &str) -> usize {
        self.counters.get(prefix).copied().unwrap_or(0)
    }
}

/// Prefixes of intermediate temporaries, which are always numbered
/// (`_t0`, `_t1`, ...). Derivative (`_d_`) and delta (`_delta_`) names are
/// tried bare first.
pub fn is_counted_prefix(prefix: &str) -> bool {
    prefix.starts_with('_') && !prefix.starts_with("_d_") && !prefix.starts_with("_delta_")
}
