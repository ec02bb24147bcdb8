//! Mnemo Search Benchmarks
//!
//! Benchmarks for the hybrid search fusion path using Criterion.
//! Run with: cargo bench -p mnemo-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mnemo_core::embeddings::cosine_similarity;
use mnemo_core::search::{fuse, linear_combination, reciprocal_rank_fusion, SearchOptions};
use mnemo_core::GraphStore;

fn bench_cosine_similarity(c: &mut Criterion) {
    let a: Vec<f32> = (0..256).map(|i| (i as f32).sin()).collect();
    let b: Vec<f32> = (0..256).map(|i| (i as f32).cos()).collect();

    c.bench_function("cosine_similarity_256d", |bencher| {
        bencher.iter(|| {
            black_box(cosine_similarity(&a, &b));
        })
    });
}

fn bench_linear_combination(c: &mut Criterion) {
    c.bench_function("linear_combination", |bencher| {
        bencher.iter(|| {
            black_box(linear_combination(0.8, 0.3, 0.6));
        })
    });
}

fn bench_rrf_fusion(c: &mut Criterion) {
    let keyword_ranking: Vec<String> = (0..50).map(|i| format!("doc-{i}")).collect();
    let semantic_ranking: Vec<String> = (0..50).map(|i| format!("doc-{}", 25 + i)).collect();
    let rankings = vec![keyword_ranking, semantic_ranking];

    c.bench_function("rrf_50x50", |bencher| {
        bencher.iter(|| {
            black_box(reciprocal_rank_fusion(&rankings, 60.0));
        })
    });
}

fn bench_fuse(c: &mut Criterion) {
    let graph = GraphStore::in_memory().unwrap();
    let vector_hits: Vec<(String, f32, serde_json::Value)> = (0..50)
        .map(|i| (format!("doc-{i}"), 1.0 - i as f32 / 50.0, serde_json::json!({})))
        .collect();
    let options = SearchOptions::default();

    c.bench_function("fuse_50_hits_no_graph_edges", |bencher| {
        bencher.iter(|| {
            black_box(fuse(vector_hits.clone(), &graph, &options).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_cosine_similarity,
    bench_linear_combination,
    bench_rrf_fusion,
    bench_fuse,
);
criterion_main!(benches);
