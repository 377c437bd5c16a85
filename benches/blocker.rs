//! Benchmarks for blocklist matching.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use nfq_dnsfilter::dns::{Blocker, is_blocked};

fn generate_blocklist(size: usize) -> Vec<String> {
    (0..size)
        .map(|i| {
            if i % 2 == 0 {
                format!("blocked{i}.com")
            } else {
                format!("ads{i}.net")
            }
        })
        .collect()
}

fn bench_is_blocked(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocker_lookup");

    for size in &[10, 100, 1000, 10000] {
        let blocklist = generate_blocklist(*size);
        let blocker = Blocker::new(&blocklist);

        // Exact match on the first entry
        group.bench_with_input(BenchmarkId::new("exact_hit", size), &blocker, |b, blocker| {
            b.iter(|| blocker.is_blocked_bytes(black_box(b"blocked0.com")));
        });

        group.bench_with_input(BenchmarkId::new("suffix_hit", size), &blocker, |b, blocker| {
            b.iter(|| blocker.is_blocked_bytes(black_box(b"tracking.ads1.net")));
        });

        // Worst case, every entry is checked
        group.bench_with_input(BenchmarkId::new("miss", size), &blocker, |b, blocker| {
            b.iter(|| blocker.is_blocked_bytes(black_box(b"www.rust-lang.org")));
        });

        group.bench_with_input(BenchmarkId::new("slice_miss", size), &blocklist, |b, list| {
            b.iter(|| is_blocked(black_box(b"www.rust-lang.org"), list));
        });
    }

    group.finish();
}

fn bench_blocker_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocker_creation");

    for size in &[10, 100, 1000, 10000] {
        let blocklist = generate_blocklist(*size);
        group.bench_with_input(BenchmarkId::new("new", size), &blocklist, |b, list| {
            b.iter(|| Blocker::new(black_box(list)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_is_blocked, bench_blocker_creation);
criterion_main!(benches);
