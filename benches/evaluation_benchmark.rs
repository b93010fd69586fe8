// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluation Benchmarks
//!
//! Measures expression evaluation, dispatch resolution, and piping through
//! verb chains over synthetic rows of increasing size.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pipeverb::{
    Arguments, Context, Expression, Pipe, RegisterOptions, Signature, Symbolic, TypeInfo, Value,
    VerbOptions, pipe_all, register_verb,
};
use std::hint::black_box;

fn generate_rows(num_rows: usize) -> Value {
    Value::list((0..num_rows).map(|i| {
        Value::map([
            ("id", Value::Integer(i as i64)),
            ("score", Value::Integer((i * 7 % 100) as i64)),
        ])
    }))
}

fn bench_operator_tree(c: &mut Criterion) {
    let f = Symbolic::new("f");
    let expr = (f.attr("a") + f.attr("b")) * 2 - f.attr("a") / 3;
    let data = Value::map([("a", 9), ("b", 4)]);

    c.bench_function("operator_tree", |b| {
        b.iter(|| black_box(&expr).evaluate(black_box(&data), Some(&Context::EVAL)))
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let size = register_verb(
        "size",
        Signature::from_names(["data"]),
        VerbOptions::new(),
        |_, _| Ok(Value::Integer(0)),
    )
    .expect("verb registers");
    size.register(&[TypeInfo::List], RegisterOptions::new(), |data, _| {
        Ok(Value::Integer(data.as_list().map_or(0, |items| items.len() as i64)))
    })
    .expect("list registers");
    size.register(
        &[TypeInfo::List],
        RegisterOptions::new().backend("fast").favored(),
        |data, _| Ok(Value::Integer(data.as_list().map_or(0, |items| items.len() as i64))),
    )
    .expect("backend registers");

    let mut group = c.benchmark_group("dispatch");
    group.bench_function("favored_backend", |b| {
        b.iter(|| size.dispatch(black_box(&TypeInfo::List), None).is_ok())
    });
    group.bench_function("fallback_default", |b| {
        b.iter(|| size.dispatch(black_box(&TypeInfo::Float), None).is_ok())
    });
    group.finish();
}

fn bench_pipe_chain(c: &mut Criterion) {
    let f = Symbolic::new("f");
    let filter = register_verb(
        "filter_above",
        Signature::from_names(["data", "threshold"]),
        VerbOptions::new().context(Context::EVAL),
        |data, args| {
            let threshold = args.get(0).and_then(Value::as_integer).unwrap_or_default();
            let rows = data.as_list().unwrap_or_default();
            let kept = rows.iter().filter(|row| {
                row.get_item(&Value::from("score"))
                    .ok()
                    .and_then(|score| score.as_integer())
                    .is_some_and(|score| score > threshold)
            });
            Ok(Value::list(kept.cloned()))
        },
    )
    .expect("verb registers");
    let count = register_verb(
        "count_rows",
        Signature::from_names(["data"]),
        VerbOptions::new(),
        |data, _| Ok(Value::Integer(data.as_list().map_or(0, |rows| rows.len() as i64))),
    )
    .expect("verb registers");

    let chain: Vec<Expression> = vec![
        filter.defer(Arguments::new().arg(f.item(0).attr("score"))),
        count.defer(Arguments::new()),
    ];

    let mut group = c.benchmark_group("pipe_chain");
    for num_rows in [10, 100, 1000] {
        let rows = generate_rows(num_rows);
        group.bench_with_input(BenchmarkId::from_parameter(num_rows), &rows, |b, rows| {
            b.iter(|| pipe_all(black_box(rows.clone()), &chain))
        });
    }
    group.finish();

    let rows = generate_rows(100);
    c.bench_function("pipe_single", |b| {
        b.iter(|| black_box(&rows).pipe(&chain[1]))
    });
}

criterion_group!(benches, bench_operator_tree, bench_dispatch, bench_pipe_chain);
criterion_main!(benches);
