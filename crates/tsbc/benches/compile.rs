// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compilation and execution benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tsbc::ast::build::*;
use tsbc::ast::{Module, Statement};
use tsbc::{compile_module, CompilerOptions, Runtime, Value};

fn filler(count: usize) -> Vec<Statement> {
    (0..count)
        .map(|_| expr(assign(ident("x"), add(ident("x"), num("1")))))
        .collect()
}

fn counting_module(classes: usize, statements: usize) -> Module {
    module(
        (0..classes)
            .map(|i| {
                let mut body = vec![let_("x", Some("int"), num("0")), let_("i", Some("int"), num("0"))];
                let mut inner = filler(statements);
                inner.push(expr(post_inc(ident("i"))));
                body.push(while_(lt(ident("i"), num("10")), block(inner)));
                body.push(ret(ident("x")));
                class(&format!("C{i}")).method(method("run", body).returns("int").static_())
            })
            .collect(),
    )
}

fn bench_compile_small(c: &mut Criterion) {
    let module = counting_module(1, 10);
    let options = CompilerOptions::default().with_parallel(false);
    c.bench_function("compile_small_method", |b| {
        b.iter(|| black_box(compile_module(black_box(&module), &options)))
    });
}

fn bench_compile_wide_branches(c: &mut Criterion) {
    let module = counting_module(1, 4000);
    let options = CompilerOptions::default().with_parallel(false);
    c.bench_function("compile_wide_branches", |b| {
        b.iter(|| black_box(compile_module(black_box(&module), &options)))
    });
}

fn bench_compile_many_classes(c: &mut Criterion) {
    let module = counting_module(64, 50);
    let mut group = c.benchmark_group("compile_64_classes");
    for parallel in [false, true] {
        let options = CompilerOptions::default().with_parallel(parallel);
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            b.iter(|| black_box(compile_module(black_box(&module), &options)))
        });
    }
    group.finish();
}

fn bench_execute_loop(c: &mut Criterion) {
    let module = counting_module(1, 10);
    let Ok(compiled) = compile_module(&module, &CompilerOptions::default()) else {
        return;
    };
    c.bench_function("execute_counting_loop", |b| {
        b.iter(|| {
            let mut runtime = Runtime::new(&compiled).ok()?;
            let result = runtime.invoke_static("C0", "run", &[]).ok()?;
            debug_assert_eq!(result, Value::Int(100));
            Some(black_box(result))
        })
    });
}

criterion_group!(
    benches,
    bench_compile_small,
    bench_compile_wide_branches,
    bench_compile_many_classes,
    bench_execute_loop,
);
criterion_main!(benches);
