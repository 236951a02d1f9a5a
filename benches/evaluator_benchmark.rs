use std::hint::black_box;

use opflow::*;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn pipeline(n: usize) -> Vec<Statement> {
    let statements = json!([
        {
            "name": "items",
            "data": { "type": { "kind": "number" }, "value": 0 },
            "operations": [
                { "value": { "name": "toRange", "parameters": [ { "data": { "value": n } } ] } }
            ]
        },
        {
            "data": { "value": { "name": "items" } },
            "operations": [
                {
                    "value": {
                        "name": "filter",
                        "parameters": [{
                            "data": { "value": {
                                "parameters": [
                                    { "name": "item", "data": { "type": { "kind": "number" }, "value": 0 } }
                                ],
                                "statements": [{
                                    "data": { "value": { "name": "item" } },
                                    "operations": [
                                        { "value": { "name": "mod", "parameters": [ { "data": { "value": 3 } } ] } },
                                        { "value": { "name": "isEqual", "parameters": [ { "data": { "value": 0 } } ] } }
                                    ]
                                }]
                            } }
                        }]
                    }
                },
                { "value": { "name": "length" } }
            ]
        }
    ]);
    serde_json::from_value(statements).unwrap()
}

fn array_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("range filter length");
    for n in [10, 100, 1000] {
        let statements = pipeline(n);
        let engine = Engine::new();
        group.bench_with_input(BenchmarkId::from_parameter(n), &statements, |b, statements| {
            b.iter(|| {
                let result = engine.eval_statements(black_box(statements));
                assert!(!result.is_error());
            })
        });
    }
    group.finish();
}

fn incremental_update(c: &mut Criterion) {
    c.bench_function("update unchanged pipeline", |b| {
        let context = Context::default();
        let statements = update_statements(&pipeline(100), &context, None, false);
        b.iter(|| update_statements(black_box(&statements), &context, None, false))
    });
}

criterion_group!(benches, array_pipeline, incremental_update);
criterion_main!(benches);
