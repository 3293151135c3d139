//! Parsing benchmarks for manifests, index documents, requirements and lock files

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sprig_benchmarks::{criterion_config, layered_registry, layered_root};
use sprig_config::toml::parse_sprig_toml;
use sprig_core::{TargetEnvironment, Version, VersionReq};
use sprig_lockfile::Lockfile;
use sprig_registry::PackageDocument;
use sprig_resolver::resolve;

fn manifest_with(dependencies: usize) -> String {
    let mut manifest = String::from("[package]\nname = \"bench\"\nversion = \"1.0.0\"\n\n[dependencies]\n");
    for i in 0..dependencies {
        match i % 3 {
            0 => manifest.push_str(&format!("dep-{} = \"^{}.0\"\n", i, i % 7 + 1)),
            1 => manifest.push_str(&format!("dep-{} = {{ version = \">={}.2,<{}.0\" }}\n", i, i % 5, i % 5 + 3)),
            _ => manifest.push_str(&format!(
                "dep-{} = {{ version = \"*\", markers = \"os == 'linux' or arch == 'x86_64'\" }}\n",
                i
            )),
        }
    }
    manifest
}

fn index_document(versions: usize) -> String {
    let entries: Vec<String> = (0..versions)
        .map(|i| {
            format!(
                r#""1.{}.0": {{ "dependencies": {{ "log": "^0.4", "tls": {{ "version": "^2", "source": "corp" }} }}, "dist": {{ "fingerprint": "blake3:{:064x}" }} }}"#,
                i, i
            )
        })
        .collect();
    format!(r#"{{ "name": "bench", "versions": {{ {} }} }}"#, entries.join(", "))
}

fn bench_manifest_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_parsing");
    for count in [10, 100, 500] {
        let content = manifest_with(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("dependencies", count), &content, |b, content| {
            b.iter(|| black_box(parse_sprig_toml(content).unwrap()));
        });
    }
    group.finish();
}

fn bench_index_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_documents");
    for count in [10, 100, 1000] {
        let json = index_document(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("versions", count), &json, |b, json| {
            b.iter(|| black_box(PackageDocument::from_json(json).unwrap()));
        });
    }
    group.finish();
}

fn bench_requirements(c: &mut Criterion) {
    let mut group = c.benchmark_group("requirements");
    let requirements = ["^1.2.3", "~0.4", ">=1.0,<2.0", "*", "=3.1.4", ">=2.0.0-beta.1"];
    let versions: Vec<Version> = (0..100).map(|i| Version::new(i / 30, i % 30, 0)).collect();

    group.bench_function("parse", |b| {
        b.iter(|| {
            for req in requirements {
                black_box(VersionReq::parse(req).unwrap());
            }
        });
    });

    let ranges: Vec<_> = requirements
        .iter()
        .map(|req| VersionReq::parse(req).unwrap().to_range())
        .collect();
    group.bench_function("contains", |b| {
        b.iter(|| {
            let mut matched = 0;
            for range in &ranges {
                matched += versions.iter().filter(|v| range.contains(v)).count();
            }
            black_box(matched)
        });
    });
    group.finish();
}

fn bench_lockfile_parsing(c: &mut Criterion) {
    let provider = layered_registry(5, 20, 3);
    let resolution = resolve(&layered_root(20), &provider, &TargetEnvironment::new()).unwrap();
    let text = Lockfile::from_resolution(&resolution, &provider, "blake3:00")
        .unwrap()
        .to_toml_string()
        .unwrap();

    c.bench_function("lockfile_parsing", |b| {
        b.iter(|| black_box(Lockfile::parse(&text).unwrap()));
    });
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_manifest_parsing, bench_index_documents, bench_requirements, bench_lockfile_parsing
}
criterion_main!(benches);
