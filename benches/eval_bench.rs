//! Benchmarks for the heightmap evaluation pipeline.
//!
//! Measures:
//!   1. Evaluation speed at increasing grid resolutions
//!   2. Graph shape scaling (deep chains vs wide trees)
//!   3. Recursive vs scheduled evaluation paths
//!   4. Preview overhead: JSON parse → graph build → evaluate → JSON serialize
//!
//! Run with:
//!   cargo bench --bench eval_bench
//!
//! Results are written to `target/criterion/` with HTML reports.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use terrain_graph::commands::PreviewService;
use terrain_graph::config::PreviewConfig;
use terrain_graph::eval::{
    evaluate_heightmap_with, Connection, EvalGraph, EvalOptions, GraphNode, GridDims,
    OperatorKind, Strategy,
};

// ── Graph factories ────────────────────────────────────────────────

fn noise(id: &str, scale: f64, amplitude: f64) -> GraphNode {
    GraphNode::new(id, OperatorKind::Noise)
        .with_param("scale", scale)
        .with_param("amplitude", amplitude)
}

/// Single noise node feeding the output.
fn graph_single_noise() -> EvalGraph {
    EvalGraph::from_raw(
        vec![noise("n", 2.0, 1.0), GraphNode::new("o", OperatorKind::Output)],
        vec![Connection::link("n", "o", "in")],
    )
}

/// Two noise layers summed and clamped: the editor's default preview graph.
fn graph_two_noise_clamped() -> EvalGraph {
    let nodes = vec![
        noise("base", 1.5, 1.0),
        noise("detail", 2.5, 0.5),
        GraphNode::new("sum", OperatorKind::Add),
        GraphNode::new("clamp", OperatorKind::Clamp),
        GraphNode::new("o", OperatorKind::Output),
    ];
    let conns = vec![
        Connection::link("base", "sum", "a"),
        Connection::link("detail", "sum", "b"),
        Connection::link("sum", "clamp", "in"),
        Connection::link("clamp", "o", "in"),
    ];
    EvalGraph::from_raw(nodes, conns)
}

/// noise → (clamp → multiply-by-self)* → output. Purely sequential.
fn graph_deep_chain(depth: usize) -> EvalGraph {
    let mut nodes = vec![noise("n", 2.0, 1.0)];
    let mut conns = Vec::new();
    let mut prev = "n".to_string();
    for i in 0..depth {
        let c = format!("c{i}");
        let m = format!("m{i}");
        nodes.push(GraphNode::new(&c, OperatorKind::Clamp));
        nodes.push(GraphNode::new(&m, OperatorKind::Multiply));
        conns.push(Connection::link(&prev, &c, "in"));
        conns.push(Connection::link(&c, &m, "a"));
        conns.push(Connection::link(&c, &m, "b"));
        prev = m;
    }
    nodes.push(GraphNode::new("o", OperatorKind::Output));
    conns.push(Connection::link(&prev, "o", "in"));
    EvalGraph::from_raw(nodes, conns)
}

/// Balanced add tree over `leaves` noise nodes. Wide levels.
fn graph_wide_tree(leaves: usize) -> EvalGraph {
    let mut nodes = Vec::new();
    let mut conns = Vec::new();
    let mut frontier: Vec<String> = (0..leaves)
        .map(|i| {
            let id = format!("leaf{i}");
            nodes.push(noise(&id, 0.5 + i as f64 * 0.25, 1.0 / (i + 1) as f64));
            id
        })
        .collect();

    let mut next_id = 0;
    while frontier.len() > 1 {
        let mut next = Vec::new();
        for pair in frontier.chunks(2) {
            let id = format!("add{next_id}");
            next_id += 1;
            nodes.push(GraphNode::new(&id, OperatorKind::Add));
            conns.push(Connection::link(&pair[0], &id, "a"));
            if let Some(b) = pair.get(1) {
                conns.push(Connection::link(b, &id, "b"));
            }
            next.push(id);
        }
        frontier = next;
    }
    nodes.push(GraphNode::new("o", OperatorKind::Output));
    conns.push(Connection::link(&frontier[0], "o", "in"));
    EvalGraph::from_raw(nodes, conns)
}

fn run(graph: &EvalGraph, dims: GridDims, strategy: Strategy) {
    let options = EvalOptions::default().with_strategy(strategy);
    black_box(evaluate_heightmap_with(graph, dims, 1337, &options).unwrap());
}

// ── Benchmark groups ───────────────────────────────────────────────

/// Evaluation at increasing grid resolutions.
fn bench_grid_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_resolution");

    for (label, graph) in [
        ("single_noise", graph_single_noise()),
        ("two_noise_clamped", graph_two_noise_clamped()),
    ] {
        for res in [32u32, 64, 128, 256, 512] {
            let dims = GridDims::new(res as i64, res as i64).unwrap();
            group.throughput(Throughput::Elements(dims.cell_count() as u64));
            group.bench_with_input(BenchmarkId::new(label, res), &dims, |b, &dims| {
                b.iter(|| run(&graph, dims, Strategy::default()));
            });
        }
    }
    group.finish();
}

/// Deep sequential chains: plan overhead with no cross-node parallelism.
fn bench_graph_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_depth");
    let dims = GridDims::new(128, 128).unwrap();

    for depth in [1usize, 8, 32, 128] {
        let graph = graph_deep_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &graph, |b, graph| {
            b.iter(|| run(graph, dims, Strategy::default()));
        });
    }
    group.finish();
}

/// Recursive vs scheduled on chain and tree shapes.
fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy");
    let dims = GridDims::new(256, 256).unwrap();

    for (label, graph) in [
        ("chain32", graph_deep_chain(32)),
        ("tree16", graph_wide_tree(16)),
        ("tree64", graph_wide_tree(64)),
    ] {
        for strategy in [Strategy::Recursive, Strategy::Scheduled] {
            let id = BenchmarkId::new(format!("{strategy:?}").to_lowercase(), label);
            group.bench_with_input(id, &graph, |b, graph| {
                b.iter(|| run(graph, dims, strategy));
            });
        }
    }
    group.finish();
}

/// Build the JSON request the editor would send for the default preview graph.
fn preview_request(res: u32, seed: i32) -> String {
    let request: Value = json!({
        "nodes": [
            {"id": "base", "nodeType": "noise", "params": {"scale": 1.5, "amplitude": 1.0}},
            {"id": "detail", "nodeType": "noise", "params": {"scale": 2.5, "amplitude": 0.5}},
            {"id": "sum", "nodeType": "add"},
            {"id": "clamp", "nodeType": "clamp", "params": {"min": 0.0, "max": 1.0}},
            {"id": "o", "nodeType": "output"}
        ],
        "connections": [
            {"from": {"nodeId": "base", "portId": "out"}, "to": {"nodeId": "sum", "portId": "a"}},
            {"from": {"nodeId": "detail", "portId": "out"}, "to": {"nodeId": "sum", "portId": "b"}},
            {"from": {"nodeId": "sum", "portId": "out"}, "to": {"nodeId": "clamp", "portId": "in"}},
            {"from": {"nodeId": "clamp", "portId": "out"}, "to": {"nodeId": "o", "portId": "in"}}
        ],
        "width": res,
        "height": res,
        "seed": seed
    });
    request.to_string()
}

/// Full preview round trip. Uncached varies the seed each iteration so
/// every call misses.
fn bench_json_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_roundtrip");

    for res in [64u32, 256] {
        group.throughput(Throughput::Elements(res as u64 * res as u64));

        let cold = PreviewService::new(PreviewConfig {
            cache_capacity: 1,
            ..PreviewConfig::default()
        });
        let mut seed = 0i32;
        group.bench_with_input(BenchmarkId::new("uncached", res), &res, |b, &res| {
            b.iter(|| {
                seed = seed.wrapping_add(1);
                black_box(cold.evaluate_json(&preview_request(res, seed)).unwrap())
            });
        });

        let warm = PreviewService::default();
        let request = preview_request(res, 1337);
        warm.evaluate_json(&request).unwrap();
        group.bench_with_input(BenchmarkId::new("cached", res), &request, |b, request| {
            b.iter(|| black_box(warm.evaluate_json(request).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_grid_resolution,
    bench_graph_depth,
    bench_strategies,
    bench_json_roundtrip,
);
criterion_main!(benches);
