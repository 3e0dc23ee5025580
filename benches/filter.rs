//! Benchmarks for normalization and include/exclude resolution.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeSet;
use std::hint::black_box;

use edgeblock::filter::{normalize, GroupFilter};
use edgeblock::model::{Origin, RuleGroup, Source, Wildcard};

/// Generate a hosts-style list with some duplicate lines
fn generate_hosts(count: usize) -> String {
    (0..count)
        .map(|i| format!("127.0.0.1 host{}.tracker{}.example\n", i % (count - count / 10), i % 500))
        .collect()
}

fn group(excludes: usize) -> RuleGroup {
    RuleGroup {
        name: "hosts".to_string(),
        ip: "0.0.0.0".to_string(),
        excludes: (0..excludes)
            .map(|i| format!("tracker{}.example", i * 7))
            .collect::<BTreeSet<_>>(),
        includes: ["*.tracker7.example".to_string()].into_iter().collect(),
        ..Default::default()
    }
}

fn source() -> Source {
    Source {
        name: "adaway".to_string(),
        disabled: false,
        description: String::new(),
        prefix: "127.0.0.1 ".to_string(),
        ip: None,
        origin: Origin::Inline(String::new()),
    }
}

fn bench_normalize(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("normalize");
    let wildcard = Wildcard::default();
    let g = group(0);
    let s = source();

    for size in [1000, 10000, 100000] {
        let raw = generate_hosts(size);
        bench_group.bench_with_input(BenchmarkId::new("hosts", size), &raw, |b, raw| {
            b.iter(|| black_box(normalize(raw, &s, &g, &wildcard)))
        });
    }

    bench_group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("resolve");
    let wildcard = Wildcard::default();
    let s = source();

    for size in [1000, 10000, 100000] {
        let g = group(50);
        let entries = normalize(&generate_hosts(size), &s, &g, &wildcard);
        let filter = GroupFilter::new(&g, &wildcard);
        bench_group.bench_with_input(BenchmarkId::new("dedup_exclude", size), &entries, |b, entries| {
            b.iter(|| black_box(filter.resolve(entries.clone())))
        });
    }

    bench_group.finish();
}

criterion_group!(benches, bench_normalize, bench_resolve);
criterion_main!(benches);
