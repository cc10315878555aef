//! MIND source-to-source differentiation engine.
//!
//! Synthesizes derivative functions over an arena-based host AST: parameter
//! resolution, scoped declaration building, clone-and-rebind, forward-mode
//! derivative rules, tape bookkeeping and numerical fallback.
pub mod ast;
pub mod autodiff;
pub mod builder;
pub mod clone;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod lookup;
pub mod numdiff;
pub mod opt;
pub mod params;
pub mod print;
pub mod runtime;
pub mod scope;
pub mod tape;
pub mod types;

pub use autodiff::{differentiate_forward, ForwardResult};
pub use config::DiffOptions;
pub use context::{install_runtime_library, DiffContext};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, Severity};
pub use error::{DiffError, InternalError};
