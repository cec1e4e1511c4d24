//! Benchmarks for graph levelling and context copy/diff.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reasonflow::context::ReasoningContext;
use reasonflow::pipeline::DependencyGraph;
use serde_json::json;

fn layered_graph(width: usize, depth: usize) -> Vec<(String, Vec<String>)> {
    let mut steps = Vec::with_capacity(width * depth);
    for layer in 0..depth {
        for i in 0..width {
            let deps = if layer == 0 {
                Vec::new()
            } else {
                (0..width).map(|j| format!("s{}_{j}", layer - 1)).collect()
            };
            steps.push((format!("s{layer}_{i}"), deps));
        }
    }
    steps
}

fn graph_benchmark(c: &mut Criterion) {
    let steps = layered_graph(8, 8);
    let graph = DependencyGraph::new(steps.iter().map(|(id, deps)| (id.as_str(), deps.as_slice())));

    c.bench_function("graph_levels_8x8", |b| b.iter(|| black_box(graph.levels())));
    c.bench_function("graph_detect_cycle_8x8", |b| {
        b.iter(|| black_box(graph.detect_cycle().is_ok()))
    });
}

fn context_benchmark(c: &mut Criterion) {
    let mut ctx = ReasoningContext::for_session("bench");
    let facts: Vec<_> = (0..200)
        .map(|i| json!({ "id": format!("f{i}"), "content": format!("fact number {i}"), "source": "kb" }))
        .collect();
    let _ = ctx.set("enrichment.facts", json!(facts));

    let mut changed = ctx.clone();
    let _ = changed.set("reasoning.intents", json!([{ "name": "question" }]));

    c.bench_function("context_clone", |b| b.iter(|| black_box(ctx.clone())));
    c.bench_function("context_diff", |b| b.iter(|| black_box(ctx.diff(&changed))));
}

criterion_group!(benches, graph_benchmark, context_benchmark);
criterion_main!(benches);
