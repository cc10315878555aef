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


use std::fs;

use srcdiff::DiffOptions;

#[test]
fn options_load_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("srcdiff.toml");
    fs::write(
        &path,
        "print_num_diff_errors = true\nnumerical_fallback = false\nlibrary_namespace = \"numlib\"\n",
    )
    .expect("write options");

    let options = DiffOptions::load(&path).expect("load");
    assert!(options.print_num_diff_errors);
    assert!(!options.numerical_fallback);
    assert_eq!(options.library_namespace, "numlib");
    assert_eq!(options.custom_derivatives_namespace, "custom_derivatives");
    assert_eq!(options.print_flag(), 1);
}

#[test]
fn load_errors_name_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "numerical_fallback = \"sometimes\"\n").expect("write options");

    let err = DiffOptions::load(&path).expect_err("type mismatch");
    assert!(format!("{err:#}").contains("broken.toml"));

    let missing = dir.path().join("absent.toml");
    let err = DiffOptions::load(&missing).expect_err("missing file");
    assert!(err.to_string().contains("absent.toml"));
}
