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


mod common;

use rstest::rstest;
use srcdiff::ast::{DeclId, TranslationUnit};
use srcdiff::params::{self, IndexInterval, ParamError};
use srcdiff::types::Type;
use srcdiff::{Diagnostics, Severity};

fn xyz() -> (TranslationUnit, DeclId, Vec<DeclId>) {
    let mut unit = TranslationUnit::new();
    let f = unit.declare_function(
        "f",
        &[
            ("x", Type::Double),
            ("y", Type::Double),
            ("arr", Type::array(Type::Double, Some(8))),
        ],
        Type::Double,
        None,
    );
    let ps = unit.params(f).to_vec();
    (unit, f, ps)
}

fn resolve_names(text: &str) -> (Result<params::DiffParams, ParamError>, Diagnostics, Vec<DeclId>) {
    common::init_logging();
    let (mut unit, f, ps) = xyz();
    let spec = unit.arena.string(text);
    let mut sink = Diagnostics::new();
    let result = params::resolve(&unit, f, spec, &mut sink);
    (result, sink, ps)
}

#[test]
fn single_name_selects_whole_parameter() {
    let (result, sink, ps) = resolve_names("x");
    let params = result.expect("resolved");
    assert_eq!(params.len(), 1);
    let p = &params.as_slice()[0];
    assert_eq!(p.decl, ps[0]);
    assert_eq!(p.position, 0);
    assert_eq!(p.interval, IndexInterval::Whole);
    assert!(sink.is_empty());
}

#[test]
fn output_follows_input_order() {
    let (result, _, ps) = resolve_names(" arr[2:5] , y,x ");
    let params = result.expect("resolved");
    assert_eq!(params.decls(), vec![ps[2], ps[1], ps[0]]);
    let positions: Vec<usize> = params.iter().map(|p| p.position).collect();
    assert_eq!(positions, vec![2, 1, 0]);
    assert_eq!(
        params.as_slice()[0].interval,
        IndexInterval::Range { first: 2, last: 5 }
    );
}

#[rstest]
#[case("arr[0:1]", 0, 1)]
#[case("arr[3:7]", 3, 7)]
#[case("arr[ 1 : 2 ]", 1, 2)]
fn ascending_ranges_are_kept_verbatim(#[case] text: &str, #[case] first: usize, #[case] last: usize) {
    let (result, _, _) = resolve_names(text);
    let params = result.expect("resolved");
    assert_eq!(params.as_slice()[0].interval, IndexInterval::Range { first, last });
}

#[rstest]
#[case("arr[2:2]")]
#[case("arr[5:1]")]
#[case("arr[3:]")]
#[case("arr[:3]")]
fn degenerate_ranges_are_rejected(#[case] text: &str) {
    let (result, sink, _) = resolve_names(text);
    assert_eq!(result, Err(ParamError::InvalidRange(text.to_string())));
    assert_eq!(sink.errors().next().map(|d| d.code), Some("E2004"));
}

#[rstest]
#[case("", ParamError::NoParameters)]
#[case("   ", ParamError::NoParameters)]
#[case("z", ParamError::UnknownParameter("z".to_string()))]
#[case("x,x", ParamError::DuplicateParameter("x".to_string()))]
#[case("y, arr[1], y", ParamError::DuplicateParameter("y".to_string()))]
#[case("arr[-1]", ParamError::InvalidIndex("arr[-1]".to_string()))]
fn malformed_name_lists(#[case] text: &str, #[case] expected: ParamError) {
    let (result, sink, _) = resolve_names(text);
    let code = expected.code();
    assert_eq!(result, Err(expected));
    let errors: Vec<_> = sink.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, code);
    assert_eq!(errors[0].severity, Severity::Error);
}

#[test]
fn empty_spec_reports_no_parameters() {
    let (result, sink, _) = resolve_names("");
    assert!(result.is_err());
    let diag = sink.errors().next().expect("error reported");
    assert_eq!(diag.message, "No parameters were provided");
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn position_in_range_selects_that_parameter(#[case] index: i64) {
    let (mut unit, f, ps) = xyz();
    let spec = unit.arena.int(index);
    let mut sink = Diagnostics::new();
    let params = params::resolve(&unit, f, spec, &mut sink).expect("resolved");
    assert_eq!(params.decls(), vec![ps[index as usize]]);
    assert_eq!(params.as_slice()[0].interval, IndexInterval::Whole);
}

#[rstest]
#[case(3)]
#[case(42)]
fn position_out_of_range_names_index_and_count(#[case] index: i64) {
    let (mut unit, f, _) = xyz();
    let spec = unit.arena.int(index);
    let mut sink = Diagnostics::new();
    let err = params::resolve(&unit, f, spec, &mut sink).expect_err("out of range");
    assert_eq!(err, ParamError::ArgumentIndexOutOfRange { index, count: 3 });
    let message = &sink.errors().next().expect("reported").message;
    assert!(message.contains(&index.to_string()));
    assert!(message.contains('3'));
}

#[test]
fn unspecified_selects_every_parameter_in_order() {
    let (mut unit, f, ps) = xyz();
    let spec = unit.arena.default_arg();
    let mut sink = Diagnostics::new();
    let params = params::resolve(&unit, f, spec, &mut sink).expect("resolved");
    assert_eq!(params.decls(), ps);
    assert!(params.iter().all(|p| p.interval.is_whole()));
}

#[test]
fn unspecified_on_parameterless_function_is_an_error() {
    let mut unit = TranslationUnit::new();
    let f = unit.declare_function("g", &[], Type::Double, None);
    let spec = unit.arena.default_arg();
    let mut sink = Diagnostics::new();
    assert_eq!(
        params::resolve(&unit, f, spec, &mut sink),
        Err(ParamError::NoCandidates)
    );
    assert_eq!(sink.errors().next().map(|d| d.code), Some("E2007"));
}

#[test]
fn other_spec_shapes_are_rejected() {
    let (mut unit, f, ps) = xyz();
    let spec = unit.arena.decl_ref(ps[0]);
    let mut sink = Diagnostics::new();
    assert_eq!(
        params::resolve(&unit, f, spec, &mut sink),
        Err(ParamError::UnsupportedSpec)
    );
    assert_eq!(sink.errors().next().map(|d| d.code), Some("E2008"));
}

#[test]
fn call_operator_selects_fields_by_position() {
    let mut unit = TranslationUnit::new();
    let record = unit.declare_record(
        "Model",
        &[("a", Type::Double), ("b", Type::Double), ("c", Type::Double)],
        None,
    );
    let op = unit.declare_call_operator(record, Type::Double);
    let fields = unit.members(Some(record)).to_vec();

    let spec = unit.arena.int(1);
    let mut sink = Diagnostics::new();
    let params = params::resolve(&unit, op, spec, &mut sink).expect("resolved");
    assert_eq!(params.decls(), vec![fields[1]]);

    let spec = unit.arena.int(3);
    assert_eq!(
        params::resolve(&unit, op, spec, &mut sink),
        Err(ParamError::FieldIndexOutOfRange { index: 3, count: 3 })
    );
}

#[test]
fn spec_span_is_attached_to_the_diagnostic() {
    let (mut unit, f, _) = xyz();
    let spec = unit.arena.string("w");
    let spec = unit.arena.with_span(spec, srcdiff::ast::Span::new(10, 13));
    let mut sink = Diagnostics::new();
    let _ = params::resolve(&unit, f, spec, &mut sink);
    assert_eq!(
        sink.errors().next().and_then(|d| d.span),
        Some(srcdiff::ast::Span::new(10, 13))
    );
}
