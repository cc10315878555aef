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

//! Diagnostics raised while synthesizing derivatives: severities, codes,
//! sinks, and caret-highlighted rendering.

use serde::Serialize;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize, // 1-based
    pub col: usize,  // 1-based (Unicode-agnostic; counts bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub phase: &'static str,
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase: "autodiff",
            code,
            severity,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Where diagnostics go. The engine reports at the point of detection and
/// never inspects what it reported.
pub trait DiagnosticSink {
    fn report(&mut self, diag: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}

/// Collecting sink that also mirrors every report to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => log::debug!("[{}] error: {}", diag.code, diag.message),
            Severity::Warning => log::debug!("[{}] warning: {}", diag.code, diag.message),
            Severity::Note => log::trace!("[{}] note: {}", diag.code, diag.message),
        }
        self.items.push(diag);
    }
}

/// Compute (line, col) from byte offset.
fn offset_to_loc(src: &str, offset: usize) -> Location {
    let mut line = 1usize;
    let mut col = 1usize;
    let mut count = 0usize;
    for ch in src.chars() {
        if count >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        count += ch.len_utf8();
    }
    Location { line, col }
}

/// Extract the single source line containing `start`.
fn line_at(src: &str, start: usize) -> (String, usize /* line_start_offset */) {
    let bytes = src.as_bytes();
    let start = start.min(bytes.len());
    let mut b = start;
    while b > 0 && bytes[b - 1] != b'\n' {
        b -= 1;
    }
    let mut e = start;
    while e < bytes.len() && bytes[e] != b'\n' {
        e += 1;
    }
    (src[b..e].to_string(), b)
}

pub fn location(src: &str, span: Span) -> Location {
    offset_to_loc(src, span.start())
}

/// Render caret-highlight under the selected span (single-line best effort).
pub fn render(src: &str, diag: &Diagnostic) -> String {
    let mut out = format!(
        "{}[{}][{}]: {}",
        diag.severity.label(),
        diag.phase,
        diag.code,
        diag.message
    );
    if let Some(span) = diag.span {
        let loc = offset_to_loc(src, span.start());
        let (line_str, line_off) = line_at(src, span.start());
        let caret_start = span.start().saturating_sub(line_off);
        let caret_len = span.end().saturating_sub(span.start()).max(1);
        let carets = format!("{}{}", " ".repeat(caret_start), "^".repeat(caret_len));
        out.push_str(&format!(
            "\n--> line {}, col {}\n{}\n{}",
            loc.line, loc.col, line_str, carets
        ));
    }
    for note in &diag.notes {
        out.push_str(&format!("\nnote: {note}"));
    }
    if let Some(help) = &diag.help {
        out.push_str(&format!("\nhelp: {help}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_lines_and_columns() {
        let src = "ab\ncd\nef";
        assert_eq!(offset_to_loc(src, 0), Location { line: 1, col: 1 });
        assert_eq!(offset_to_loc(src, 4), Location { line: 2, col: 2 });
        assert_eq!(offset_to_loc(src, 6), Location { line: 3, col: 1 });
    }

    #[test]
    fn collector_separates_severities() {
        let mut sink = Diagnostics::new();
        sink.report(Diagnostic::warning("W2001", "fallback"));
        sink.report(Diagnostic::error("E2001", "No parameters were provided"));
        assert!(sink.has_errors());
        assert_eq!(sink.errors().count(), 1);
        assert_eq!(sink.warnings().count(), 1);
        assert_eq!(sink.len(), 2);
    }
}
