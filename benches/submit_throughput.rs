//! Producer-side throughput: name matching and queueing into a running
//! aggregator.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metric_aggregator::clock::ManualClock;
use metric_aggregator::matcher::Matcher;
use metric_aggregator::{Aggregator, AggregatorConfig, RuntimeOptions};
use std::sync::Arc;
use std::time::Duration;

const REGEX: &str = r"^servers\.([^.]+)\.cpu\.(user|system)$";
const FORMAT: &str = "cpu.$2.$1";

fn metric_names(count: usize, matching_ratio: f64) -> Vec<Vec<u8>> {
    let matching = (count as f64 * matching_ratio) as usize;
    (0..count)
        .map(|i| {
            if i < matching {
                format!("servers.host{}.cpu.user", i % 500).into_bytes()
            } else if i % 2 == 0 {
                format!("servers.host{}.mem.free", i % 500).into_bytes()
            } else {
                format!("network.if{}.rx_bytes", i % 64).into_bytes()
            }
        })
        .collect()
}

fn benchmark_matching(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let cached = Matcher::new(REGEX, None, None, FORMAT, true, clock.clone()).unwrap();
    let uncached = Matcher::new(REGEX, None, None, FORMAT, false, clock).unwrap();

    let mut group = c.benchmark_group("name_matching");
    for &ratio in &[0.05, 0.5, 1.0] {
        let names = metric_names(5_000, ratio);
        group.throughput(Throughput::Elements(names.len() as u64));

        group.bench_with_input(BenchmarkId::new("pre_match", ratio), &names, |b, names| {
            b.iter(|| {
                names
                    .iter()
                    .filter(|name| cached.pre_match(black_box(name)))
                    .count()
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", ratio), &names, |b, names| {
            b.iter(|| {
                names
                    .iter()
                    .filter_map(|name| cached.match_with_cache(black_box(name)))
                    .count()
            });
        });

        group.bench_with_input(BenchmarkId::new("uncached", ratio), &names, |b, names| {
            b.iter(|| {
                names
                    .iter()
                    .filter_map(|name| uncached.match_with_cache(black_box(name)))
                    .count()
            });
        });
    }
    group.finish();
}

fn benchmark_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator_submit");
    group.measurement_time(Duration::from_secs(10));

    for &drop_raw in &[false, true] {
        let config = AggregatorConfig::new("sum", REGEX, FORMAT, 60, 30).with_drop_raw(drop_raw);
        let (out_tx, _out_rx) = crossbeam_channel::unbounded();
        // ticks never arrive, so buckets only accumulate
        let (_tick_tx, tick_rx) = crossbeam_channel::unbounded();
        let options = RuntimeOptions::with_tick(Arc::new(ManualClock::new(1_700_000_000)), tick_rx);
        let aggregator = Aggregator::with_options(config, out_tx, options).unwrap();

        let names = metric_names(5_000, 0.5);
        group.throughput(Throughput::Elements(names.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("drop_raw", drop_raw),
            &names,
            |b, names| {
                b.iter(|| {
                    for name in names {
                        black_box(aggregator.submit(name, 1.0, 1_700_000_000));
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_matching, benchmark_submit);
criterion_main!(benches);
