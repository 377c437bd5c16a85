//! Benchmarks for the per-packet parsing path.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::mock::StepRng;
use std::hint::black_box;

use nfq_dnsfilter::dns::{Blocker, decode};
use nfq_dnsfilter::packet::{PacketBuilder, header};
use nfq_dnsfilter::policy::VerdictPolicy;

fn query(domain: &str) -> Vec<u8> {
    PacketBuilder::dns_client().dns_query(domain, 1).unwrap()
}

fn bench_header(c: &mut Criterion) {
    let packet = query("www.example.com");

    c.bench_function("header_parse", |b| {
        b.iter(|| header::parse(black_box(&packet)));
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("qname_decode");

    let short = query("a.io");
    let typical = query("www.example.com");
    let long = query(&format!("{}.{}.{}.com", "a".repeat(63), "b".repeat(63), "c".repeat(63)));

    for (name, packet) in [("short", &short), ("typical", &typical), ("long", &long)] {
        let payload = header::parse(packet).unwrap().udp_payload(packet).to_vec();
        group.bench_function(name, |b| {
            b.iter(|| decode(black_box(&payload)));
        });
    }

    group.finish();
}

fn bench_policy(c: &mut Criterion) {
    let blocklist: Vec<String> = (0..1000).map(|i| format!("blocked{i}.com")).collect();
    let policy = VerdictPolicy::new(Blocker::new(&blocklist), 0.0);
    let packet = query("www.example.com");
    let mut rng = StepRng::new(u64::MAX, 0);

    c.bench_function("policy_evaluate", |b| {
        b.iter(|| policy.evaluate(black_box(&packet), &mut rng));
    });
}

criterion_group!(benches, bench_header, bench_decode, bench_policy);
criterion_main!(benches);
