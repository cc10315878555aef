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

//! Engine options, loadable from a TOML table.
//!
//! ```
//! use srcdiff::config::DiffOptions;
//! let opts = DiffOptions::from_toml_str("print_num_diff_errors = true").unwrap();
//! assert!(opts.print_num_diff_errors);
//! assert!(opts.numerical_fallback);
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiffOptions {
    /// Ask the numerical helpers to print their error estimate.
    #[serde(default)]
    pub print_num_diff_errors: bool,
    /// Fall back to central differences when no symbolic rule applies.
    #[serde(default = "default_true")]
    pub numerical_fallback: bool,
    /// Namespace holding the tape, array_ref and numerical helpers.
    #[serde(default = "default_library_namespace")]
    pub library_namespace: String,
    /// Namespace searched for user-provided derivatives.
    #[serde(default = "default_custom_namespace")]
    pub custom_derivatives_namespace: String,
}

fn default_true() -> bool {
    true
}

fn default_library_namespace() -> String {
    "srcdiff".to_string()
}

fn default_custom_namespace() -> String {
    "custom_derivatives".to_string()
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            print_num_diff_errors: false,
            numerical_fallback: true,
            library_namespace: default_library_namespace(),
            custom_derivatives_namespace: default_custom_namespace(),
        }
    }
}

impl DiffOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid autodiff options")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Value of the error-estimate flag as passed to the numerical helpers.
    pub fn print_flag(&self) -> i64 {
        i64::from(self.print_num_diff_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_gives_defaults() {
        let opts = DiffOptions::from_toml_str("").expect("parse");
        assert_eq!(opts, DiffOptions::default());
        assert_eq!(opts.print_flag(), 0);
    }

    #[test]
    fn every_field_overrides() {
        let opts = DiffOptions::from_toml_str(
            r#"
print_num_diff_errors = true
numerical_fallback = false
library_namespace = "rt"
custom_derivatives_namespace = "user_derivs"
"#,
        )
        .expect("parse");
        assert!(opts.print_num_diff_errors);
        assert!(!opts.numerical_fallback);
        assert_eq!(opts.library_namespace, "rt");
        assert_eq!(opts.custom_derivatives_namespace, "user_derivs");
        assert_eq!(opts.print_flag(), 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = DiffOptions::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("autodiff.toml");
        fs::write(&path, "numerical_fallback = false\n").expect("write");
        let opts = DiffOptions::load(&path).expect("load");
        assert!(!opts.numerical_fallback);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(DiffOptions::from_toml_str("numerical_fallback = 3").is_err());
    }
}
