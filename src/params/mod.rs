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

//! Resolution of the differentiation-argument specification.
//!
//! A request names its independent variables in one of three ways: a string
//! literal listing names with optional `[i]` / `[first:last]` selectors, an
//! integer literal selecting a candidate by position, or a defaulted
//! argument meaning "every candidate". Candidates are the function's
//! parameters or, for a parameterless call operator, the fields of its
//! record.
//!
//! Every failure is reported to the diagnostic sink at the location of the
//! specification expression and returned as a [`ParamError`]; nothing is
//! returned partially.

use std::fmt;

use crate::ast::{DeclId, ExprId, ExprKind, TranslationUnit};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::opt::fold;

/// Element selection on a target variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexInterval {
    /// The whole variable.
    Whole,
    /// One element.
    Index(usize),
    /// Elements `[first, last)`.
    Range { first: usize, last: usize },
}

impl IndexInterval {
    pub fn is_whole(&self) -> bool {
        matches!(self, IndexInterval::Whole)
    }

    /// Half-open element bounds, `None` for the whole variable.
    pub fn bounds(&self) -> Option<(usize, usize)> {
        match *self {
            IndexInterval::Whole => None,
            IndexInterval::Index(idx) => Some((idx, idx + 1)),
            IndexInterval::Range { first, last } => Some((first, last)),
        }
    }

    /// Number of selected elements, `None` for the whole variable.
    pub fn len(&self) -> Option<usize> {
        self.bounds().map(|(first, last)| last - first)
    }
}

impl fmt::Display for IndexInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexInterval::Whole => Ok(()),
            IndexInterval::Index(idx) => write!(f, "[{idx}]"),
            IndexInterval::Range { first, last } => write!(f, "[{first}:{last}]"),
        }
    }
}

/// One independent variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffParam {
    pub decl: DeclId,
    /// Position among the candidates.
    pub position: usize,
    pub interval: IndexInterval,
}

/// Ordered, duplicate-free selection of independent variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffParams {
    items: Vec<DiffParam>,
}

impl DiffParams {
    pub fn iter(&self) -> std::slice::Iter<'_, DiffParam> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[DiffParam] {
        &self.items
    }

    pub fn decls(&self) -> Vec<DeclId> {
        self.items.iter().map(|p| p.decl).collect()
    }

    pub fn contains(&self, decl: DeclId) -> bool {
        self.items.iter().any(|p| p.decl == decl)
    }
}

impl<'a> IntoIterator for &'a DiffParams {
    type Item = &'a DiffParam;
    type IntoIter = std::slice::Iter<'a, DiffParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Parameters,
    /// Fields of the record whose parameterless call operator is differentiated.
    Fields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub source: CandidateSource,
    pub decls: Vec<DeclId>,
}

impl Candidates {
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Differentiable targets of `function`, in declaration order.
pub fn candidates(unit: &TranslationUnit, function: DeclId) -> Candidates {
    let Some(func) = unit.decl(function).as_function() else {
        return Candidates {
            source: CandidateSource::Parameters,
            decls: Vec::new(),
        };
    };
    match func.functor {
        Some(record) if func.params.is_empty() => Candidates {
            source: CandidateSource::Fields,
            decls: unit.members(Some(record)).to_vec(),
        },
        _ => Candidates {
            source: CandidateSource::Parameters,
            decls: func.params.clone(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("No parameters were provided")]
    NoParameters,
    #[error("Requested parameter name '{0}' was not found among function parameters")]
    UnknownParameter(String),
    #[error("Requested parameter '{0}' was specified multiple times")]
    DuplicateParameter(String),
    #[error("Range specified in '{0}' is in incorrect format")]
    InvalidRange(String),
    #[error("Index specified in '{0}' is not a non-negative integer")]
    InvalidIndex(String),
    #[error("Invalid argument index '{index}' of '{count}' argument(s)")]
    ArgumentIndexOutOfRange { index: i64, count: usize },
    #[error("Invalid member variable index '{index}' of '{count}' member variable(s)")]
    FieldIndexOutOfRange { index: i64, count: usize },
    #[error("Attempted to differentiate a function without parameters")]
    NoCandidates,
    #[error("Failed to parse the parameters, must be a string or numeric literal")]
    UnsupportedSpec,
}

impl ParamError {
    pub fn code(&self) -> &'static str {
        match self {
            ParamError::NoParameters => "E2001",
            ParamError::UnknownParameter(_) => "E2002",
            ParamError::DuplicateParameter(_) => "E2003",
            ParamError::InvalidRange(_) => "E2004",
            ParamError::InvalidIndex(_) => "E2005",
            ParamError::ArgumentIndexOutOfRange { .. } | ParamError::FieldIndexOutOfRange { .. } => {
                "E2006"
            }
            ParamError::NoCandidates => "E2007",
            ParamError::UnsupportedSpec => "E2008",
        }
    }
}

/// Shape of a specification expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecShape {
    Names(String),
    Position(i64),
    Unspecified,
    Other,
}

pub fn classify(unit: &TranslationUnit, spec: ExprId) -> SpecShape {
    let arena = &unit.arena;
    let inner = arena.ignore_paren_imp_casts(spec);
    match arena.kind(inner) {
        ExprKind::StrLit(text) => SpecShape::Names(text.clone()),
        ExprKind::DefaultArg => SpecShape::Unspecified,
        _ => match fold::eval_int(arena, inner) {
            Some(value) => SpecShape::Position(value),
            None => SpecShape::Other,
        },
    }
}

/// Resolve `spec` against the candidates of `function`.
pub fn resolve(
    unit: &TranslationUnit,
    function: DeclId,
    spec: ExprId,
    sink: &mut dyn DiagnosticSink,
) -> Result<DiffParams, ParamError> {
    let cands = candidates(unit, function);
    let result = match classify(unit, spec) {
        SpecShape::Names(text) => parse_name_list(unit, &text, &cands),
        SpecShape::Position(index) => select_position(index, &cands),
        SpecShape::Unspecified => select_all(&cands),
        SpecShape::Other => Err(ParamError::UnsupportedSpec),
    };
    match &result {
        Ok(params) => log::debug!(
            "resolved {} independent variable(s) for '{}'",
            params.len(),
            unit.name(function)
        ),
        Err(err) => {
            let span = unit.arena.expr(spec).span;
            sink.report(Diagnostic::error(err.code(), err.to_string()).with_span(span));
        }
    }
    result
}

/// Parse a comma separated list of names with optional element selectors.
pub fn parse_name_list(
    unit: &TranslationUnit,
    text: &str,
    cands: &Candidates,
) -> Result<DiffParams, ParamError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParamError::NoParameters);
    }

    let mut items: Vec<DiffParam> = Vec::new();
    for token in text.split(',').map(str::trim) {
        let bracket = token.find('[').unwrap_or(token.len());
        let base = &token[..bracket];

        let Some(position) = cands.decls.iter().position(|d| unit.name(*d) == base) else {
            return Err(ParamError::UnknownParameter(base.to_string()));
        };
        let decl = cands.decls[position];
        if items.iter().any(|p| p.decl == decl) {
            return Err(ParamError::DuplicateParameter(base.to_string()));
        }

        let interval = if bracket == token.len() {
            IndexInterval::Whole
        } else {
            parse_interval(token, bracket)?
        };
        items.push(DiffParam {
            decl,
            position,
            interval,
        });
    }
    Ok(DiffParams { items })
}

fn parse_interval(token: &str, bracket: usize) -> Result<IndexInterval, ParamError> {
    let rest = &token[bracket + 1..];
    let inner = match rest.find(']') {
        Some(close) => &rest[..close],
        None => rest,
    };
    match inner.split_once(':') {
        None => inner
            .trim()
            .parse::<usize>()
            .map(IndexInterval::Index)
            .map_err(|_| ParamError::InvalidIndex(token.to_string())),
        Some((first, last)) => {
            let first = first.trim().parse::<usize>();
            let last = last.trim().parse::<usize>();
            match (first, last) {
                (Ok(first), Ok(last)) if first < last => Ok(IndexInterval::Range { first, last }),
                _ => Err(ParamError::InvalidRange(token.to_string())),
            }
        }
    }
}

fn select_position(index: i64, cands: &Candidates) -> Result<DiffParams, ParamError> {
    let count = cands.len();
    let in_range = usize::try_from(index).ok().filter(|idx| *idx < count);
    let Some(position) = in_range else {
        return Err(match cands.source {
            CandidateSource::Fields => ParamError::FieldIndexOutOfRange { index, count },
            CandidateSource::Parameters => ParamError::ArgumentIndexOutOfRange { index, count },
        });
    };
    Ok(DiffParams {
        items: vec![DiffParam {
            decl: cands.decls[position],
            position,
            interval: IndexInterval::Whole,
        }],
    })
}

fn select_all(cands: &Candidates) -> Result<DiffParams, ParamError> {
    if cands.is_empty() {
        return Err(ParamError::NoCandidates);
    }
    let items = cands
        .decls
        .iter()
        .enumerate()
        .map(|(position, decl)| DiffParam {
            decl: *decl,
            position,
            interval: IndexInterval::Whole,
        })
        .collect();
    Ok(DiffParams { items })
}
