//! Resolution benchmarks
//!
//! Wide and deep registries exercise propagation and decision making; the
//! backtracking registry exercises conflict analysis and backjumping.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sprig_benchmarks::{backtracking_registry, criterion_config, layered_registry, layered_root, root_of};
use sprig_core::TargetEnvironment;
use sprig_lockfile::Lockfile;
use sprig_resolver::{resolve, Resolver, ResolverOptions};

fn bench_layered_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("layered_resolution");
    let environment = TargetEnvironment::new();

    for (layers, width) in [(3, 5), (5, 10), (8, 20)] {
        let provider = layered_registry(layers, width, 10);
        let root = layered_root(width);
        group.throughput(Throughput::Elements((layers * width) as u64));
        group.bench_with_input(
            BenchmarkId::new("packages", layers * width),
            &(provider, root),
            |b, (provider, root)| {
                b.iter(|| black_box(resolve(root, provider, &environment).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_backtracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtracking");
    let environment = TargetEnvironment::new();
    let root = root_of(&["a", "b"]);

    for versions in [10, 50, 200] {
        let provider = backtracking_registry(versions);
        group.bench_with_input(BenchmarkId::new("rejected_versions", versions), &provider, |b, provider| {
            b.iter(|| black_box(resolve(&root, provider, &environment).unwrap()));
        });
    }

    group.finish();
}

fn bench_prefetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefetch");
    let environment = TargetEnvironment::new();
    let provider = layered_registry(5, 20, 10);
    let root = layered_root(20);

    for prefetch in [false, true] {
        let options = ResolverOptions {
            prefetch,
            ..ResolverOptions::default()
        };
        group.bench_with_input(BenchmarkId::new("enabled", prefetch), &options, |b, options| {
            b.iter(|| {
                black_box(
                    Resolver::new(&provider, &environment)
                        .with_options(options.clone())
                        .resolve(&root)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_locking(c: &mut Criterion) {
    let environment = TargetEnvironment::new();
    let provider = layered_registry(5, 20, 10);
    let resolution = resolve(&layered_root(20), &provider, &environment).unwrap();

    c.bench_function("lock_serialization", |b| {
        b.iter(|| {
            let lock = Lockfile::from_resolution(&resolution, &provider, "blake3:00").unwrap();
            black_box(lock.to_toml_string().unwrap())
        });
    });
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_layered_resolution, bench_backtracking, bench_prefetch, bench_locking
}
criterion_main!(benches);
