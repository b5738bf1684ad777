//! Benchmarks for notation translation, structural distance and the node cache.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cogbridge::config::BridgeConfig;
use cogbridge::connector::Connector;
use cogbridge::memory;
use cogbridge::notation;

fn bench_translate(c: &mut Criterion) {
    let client = "\u{2207}(user_interaction) \u{2192} \u{03A8}(response_generation) \u{2297} \u{03A6}(context)";
    let server = notation::to_server_notation(client);

    c.bench_function("to_server_notation", |bench| {
        bench.iter(|| black_box(notation::to_server_notation(black_box(client))))
    });
    c.bench_function("to_client_notation", |bench| {
        bench.iter(|| black_box(notation::to_client_notation(black_box(&server))))
    });
}

fn bench_distance(c: &mut Criterion) {
    let a = "(AndLink (InheritanceLink (ConceptNode \"cat\") (ConceptNode \"animal\")) (NotLink (NotLink (ConceptNode \"pet\"))))";
    let b = "(AndLink (ConceptNode \"pet\") (InheritanceLink (ConceptNode \"dog\") (ConceptNode \"animal\")))";

    c.bench_function("distance_canonical", |bench| {
        bench.iter(|| black_box(memory::distance(black_box(a), black_box(b))))
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let connector = Connector::new(BridgeConfig {
        staging_dir: dir.path().to_path_buf(),
        ..Default::default()
    });
    connector.create_concept_node("hot").unwrap();

    c.bench_function("create_node_cache_hit", |bench| {
        bench.iter(|| black_box(connector.create_concept_node(black_box("hot")).unwrap()))
    });
}

criterion_group!(benches, bench_translate, bench_distance, bench_cache_hit);
criterion_main!(benches);
