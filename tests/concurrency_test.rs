//! Many producers submitting to one aggregator.

mod common;

use common::{parse_lines, TestAggregator};
use metric_aggregator::AggregatorConfig;
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_parallel_producers_lose_nothing() -> anyhow::Result<()> {
    let config = AggregatorConfig::new("sum", r"^load\.(h\d)$", "load.total", 10, 5);
    // a tiny queue forces producers to block on the worker
    let t = TestAggregator::start_with(config, 100, |options| options.queue_size(4))?;

    (0..10_000u64).into_par_iter().for_each(|i| {
        let name = format!("load.h{}", i % 10);
        t.aggregator.submit(name.as_bytes(), 1.0, 100 + i % 20);
    });

    t.tick(125)?;
    let lines = parse_lines(&t.lines());
    assert_eq!(
        lines,
        vec![
            ("load.total".to_string(), 5_000.0, 100),
            ("load.total".to_string(), 5_000.0, 110),
        ]
    );
    assert_eq!(t.aggregator.stats().samples_in, 10_000);
    assert_eq!(t.aggregator.stats().timestamp_range, Some((100, 119)));
    Ok(())
}

#[test]
fn test_parallel_drop_raw_decisions() -> anyhow::Result<()> {
    let config = AggregatorConfig::new("count", r"^req\.(\w+)\.ok$", "req.$1.ok", 10, 5)
        .with_drop_raw(true);
    let t = TestAggregator::start(config, 100)?;

    let consumed: usize = (0..4_000u64)
        .into_par_iter()
        .map(|i| {
            let name = if i % 2 == 0 {
                format!("req.svc{}.ok", i % 4)
            } else {
                format!("req.svc{}.fail", i % 4)
            };
            usize::from(t.aggregator.submit(name.as_bytes(), 1.0, 100))
        })
        .sum();
    assert_eq!(consumed, 2_000);

    t.tick(120)?;
    let mut lines = t.lines();
    lines.sort();
    assert_eq!(
        lines,
        vec!["req.svc0.ok 1000.000000 100", "req.svc2.ok 1000.000000 100"]
    );
    Ok(())
}

#[test]
fn test_shutdown_races_with_producers() -> anyhow::Result<()> {
    let config = AggregatorConfig::new("count", r"^race\.", "race.count", 10, 5);
    let t = Arc::new(TestAggregator::start(config, 100)?);

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let t = t.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    t.aggregator.submit(b"race.x", 1.0, 100);
                }
            })
        })
        .collect();

    t.clock.set(200);
    t.aggregator.shutdown();
    t.aggregator.shutdown();

    for producer in producers {
        producer.join().expect("producer panicked");
    }

    assert!(!t.aggregator.is_running());
    assert!(t.aggregator.snapshot().is_err());

    // everything that reached the worker before it stopped is accounted for
    let stats = t.aggregator.stats();
    let lines = parse_lines(&t.lines());
    assert!(lines.len() <= 1);
    let counted = lines.first().map_or(0, |(_, count, _)| *count as u64);
    assert_eq!(counted, stats.samples_in - stats.samples_too_old);
    assert!(counted <= 4_000);
    if let Some((key, _, ts)) = lines.first() {
        assert_eq!(key, "race.count");
        assert_eq!(*ts, 100);
    }
    Ok(())
}
