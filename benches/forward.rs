use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use srcdiff::ast::{BinOp, DeclId, TranslationUnit};
use srcdiff::print::format_function;
use srcdiff::runtime::{central_difference, forward_central_difference, Tape};
use srcdiff::types::Type;
use srcdiff::{differentiate_forward, install_runtime_library, DiffContext, DiffOptions, Diagnostics};

/// `f(x, y) = x*y + x*y + ...` with `terms` products.
fn sum_of_products(terms: usize) -> (TranslationUnit, DeclId) {
    let mut unit = TranslationUnit::new();
    install_runtime_library(&mut unit, &DiffOptions::default());
    let f = unit.declare_function("f", &[("x", Type::Double), ("y", Type::Double)], Type::Double, None);
    let ps = unit.params(f).to_vec();
    let a = &mut unit.arena;
    let mut acc = a.float(0.0);
    for _ in 0..terms {
        let x = a.decl_ref(ps[0]);
        let y = a.decl_ref(ps[1]);
        let xy = a.binary(BinOp::Mul, x, y);
        acc = a.binary(BinOp::Add, acc, xy);
    }
    let ret = a.ret(Some(acc));
    let body = a.compound(vec![ret]);
    unit.set_body(f, body);
    (unit, f)
}

/// `f(x) = g(g(...g(x)))` where `g` has no derivative, so every call takes
/// the numerical fallback.
fn opaque_chain(depth: usize) -> (TranslationUnit, DeclId) {
    let mut unit = TranslationUnit::new();
    install_runtime_library(&mut unit, &DiffOptions::default());
    let g = unit.declare_function("g", &[("v", Type::Double)], Type::Double, None);
    let f = unit.declare_function("f", &[("x", Type::Double)], Type::Double, None);
    let x = unit.params(f)[0];
    let a = &mut unit.arena;
    let mut acc = a.decl_ref(x);
    for _ in 0..depth {
        acc = a.call(g, vec![acc]);
    }
    let ret = a.ret(Some(acc));
    let body = a.compound(vec![ret]);
    unit.set_body(f, body);
    (unit, f)
}

fn run(unit: &mut TranslationUnit, ctx: &DiffContext, f: DeclId) -> DeclId {
    let spec = unit.arena.string("x");
    let mut sink = Diagnostics::new();
    differentiate_forward(unit, ctx, f, spec, &mut sink)
        .expect("differentiation failed")
        .derivative
}

fn bench_forward_products(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_products");
    let ctx = DiffContext::default();

    for terms in [8usize, 64, 256] {
        let (unit, f) = sum_of_products(terms);
        group.bench_with_input(BenchmarkId::new("derive", terms), &unit, |b, unit| {
            b.iter_batched(
                || unit.clone(),
                |mut unit| run(&mut unit, &ctx, black_box(f)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_forward_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_fallback");
    let ctx = DiffContext::default();

    for depth in [4usize, 32] {
        let (unit, f) = opaque_chain(depth);
        group.bench_with_input(BenchmarkId::new("derive_and_print", depth), &unit, |b, unit| {
            b.iter_batched(
                || unit.clone(),
                |mut unit| {
                    let derivative = run(&mut unit, &ctx, black_box(f));
                    format_function(&unit, derivative)
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_runtime_differences(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_differences");
    let args = [0.3, 1.7, -2.2, 4.0];
    let f = |a: &[f64]| a[0].sin() * a[1] + a[2].exp() / a[3];

    group.bench_function("forward_central_difference", |b| {
        b.iter(|| forward_central_difference(f, black_box(&args), 2, false).expect("in range"));
    });
    group.bench_function("central_difference", |b| {
        b.iter(|| {
            let mut slots = [0.0; 4];
            let mut grads = Tape::new();
            grads.extend(slots.iter_mut());
            central_difference(f, &mut grads, false, black_box(&args)).expect("slots match");
            drop(grads);
            slots
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_forward_products,
    bench_forward_fallback,
    bench_runtime_differences
);

criterion_main!(benches);
