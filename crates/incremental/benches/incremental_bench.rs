//! Benchmarks for vigil-incremental.
//!
//! Target: single attribute update through a filter and a composite < 10μs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vigil_core::{attrs, DependencySpec, Entity, NodeId, Value};
use vigil_incremental::{EntityStore, NodeChange, PredicateCache, QueryGraph};

fn flag(graph: &mut QueryGraph, store: &EntityStore, key: &'static str) -> NodeId {
    graph
        .register_filter(
            store,
            format!("flag({})", key),
            DependencySpec::key(key),
            Box::new(move |e: &Entity| Ok(e.get(key).map_or(false, Value::is_truthy))),
        )
        .unwrap()
}

fn populate(graph: &mut QueryGraph, store: &mut EntityStore, size: u64) {
    let mut out = Vec::new();
    for i in 0..size {
        let id = store.create();
        store
            .set_attributes(id, attrs([("a", i % 2 == 0), ("b", i % 3 == 0)]))
            .unwrap();
        graph.on_insert(store, id, &mut out).unwrap();
        out.clear();
    }
}

fn bench_predicate_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    group.bench_function("insert_evicting", |b| {
        let mut cache = PredicateCache::new(1000);
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            cache.insert(black_box(id), true)
        })
    });

    group.bench_function("get_hit", |b| {
        let mut cache = PredicateCache::new(1000);
        for id in 0..1000 {
            cache.insert(id, id % 2 == 0);
        }
        b.iter(|| cache.get(black_box(500)))
    });

    group.finish();
}

fn bench_register_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_filter");

    for size in [100, 1000, 10000] {
        let mut store = EntityStore::new();
        let mut seed = QueryGraph::new();
        populate(&mut seed, &mut store, size);

        group.bench_with_input(BenchmarkId::new("scan", size), &store, |b, store| {
            b.iter(|| {
                let mut graph = QueryGraph::new();
                flag(&mut graph, black_box(store), "a")
            })
        });
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for size in [100, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("toggle_composite", size), &size, |b, &size| {
            let mut store = EntityStore::new();
            let mut graph = QueryGraph::new();
            let fa = flag(&mut graph, &store, "a");
            let fb = flag(&mut graph, &store, "b");
            graph.compose_and(&[fa, fb]).unwrap();
            populate(&mut graph, &mut store, size);

            let mut out: Vec<NodeChange> = Vec::new();
            let mut on = false;
            b.iter(|| {
                on = !on;
                let changed = store.set_attributes(1, attrs([("a", on)])).unwrap();
                graph.on_update(&store, 1, &changed, &mut out).unwrap();
                out.clear();
            })
        });
    }

    // Disjoint keys never reach the predicate
    group.bench_function("untouched_key", |b| {
        let mut store = EntityStore::new();
        let mut graph = QueryGraph::new();
        flag(&mut graph, &store, "a");
        populate(&mut graph, &mut store, 100);

        let mut out = Vec::new();
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            let changed = store.set_attributes(1, attrs([("other", n)])).unwrap();
            graph.on_update(&store, 1, &changed, &mut out).unwrap();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_predicate_cache,
    bench_register_filter,
    bench_update,
);

criterion_main!(benches);
