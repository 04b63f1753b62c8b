//! Built-in reduction functions.

use super::{Processor, ProcessorConstructor, ProcessorRegistry, ProcessorResult};
use std::sync::Arc;

/// Percentiles reported by the `percentiles` function, as (name, rank).
const PERCENTILES: [(&str, f64); 6] = [
    ("p25", 25.0),
    ("p50", 50.0),
    ("p75", 75.0),
    ("p90", 90.0),
    ("p95", 95.0),
    ("p99", 99.0),
];

/// Register every built-in function in `registry`.
pub fn register_defaults(registry: &mut ProcessorRegistry) {
    registry.register("avg", create_avg());
    registry.register("count", create_count());
    registry.register("delta", create_delta());
    registry.register("derive", create_derive());
    registry.register("last", create_last());
    registry.register("max", create_max());
    registry.register("min", create_min());
    registry.register("percentiles", create_percentiles());
    registry.register("stdev", create_stdev());
    registry.register("sum", create_sum());
}

fn single(name: &str, value: f64) -> Option<Vec<ProcessorResult>> {
    Some(vec![ProcessorResult::new(name, value)])
}

struct Avg {
    sum: f64,
    count: u64,
}

impl Processor for Avg {
    fn add(&mut self, value: f64, _ts: u64) {
        self.sum += value;
        self.count += 1;
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("avg", self.sum / self.count as f64)
    }
}

/// Arithmetic mean of the bucket.
pub fn create_avg() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> {
        Box::new(Avg {
            sum: value,
            count: 1,
        })
    })
}

struct Count(u64);

impl Processor for Count {
    fn add(&mut self, _value: f64, _ts: u64) {
        self.0 += 1;
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("count", self.0 as f64)
    }
}

/// Number of samples in the bucket.
pub fn create_count() -> ProcessorConstructor {
    Arc::new(|_value: f64, _ts: u64| -> Box<dyn Processor> { Box::new(Count(1)) })
}

struct Delta {
    min: f64,
    max: f64,
}

impl Processor for Delta {
    fn add(&mut self, value: f64, _ts: u64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("delta", self.max - self.min)
    }
}

/// Spread between the largest and smallest value.
pub fn create_delta() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> {
        Box::new(Delta {
            min: value,
            max: value,
        })
    })
}

struct Derive {
    first: (u64, f64),
    last: (u64, f64),
}

impl Processor for Derive {
    fn add(&mut self, value: f64, ts: u64) {
        if ts < self.first.0 {
            self.first = (ts, value);
        }
        if ts >= self.last.0 {
            self.last = (ts, value);
        }
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        let span = self.last.0.checked_sub(self.first.0).filter(|s| *s > 0)?;
        single("derive", (self.last.1 - self.first.1) / span as f64)
    }
}

/// Per-second rate of change between the earliest and latest sample.
///
/// Declines to flush when every sample carries the same timestamp.
pub fn create_derive() -> ProcessorConstructor {
    Arc::new(|value: f64, ts: u64| -> Box<dyn Processor> {
        Box::new(Derive {
            first: (ts, value),
            last: (ts, value),
        })
    })
}

struct Last {
    ts: u64,
    value: f64,
}

impl Processor for Last {
    fn add(&mut self, value: f64, ts: u64) {
        if ts >= self.ts {
            self.ts = ts;
            self.value = value;
        }
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("last", self.value)
    }
}

/// Value with the latest timestamp; later arrivals win ties.
pub fn create_last() -> ProcessorConstructor {
    Arc::new(|value: f64, ts: u64| -> Box<dyn Processor> { Box::new(Last { ts, value }) })
}

struct Max(f64);

impl Processor for Max {
    fn add(&mut self, value: f64, _ts: u64) {
        self.0 = self.0.max(value);
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("max", self.0)
    }
}

pub fn create_max() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> { Box::new(Max(value)) })
}

struct Min(f64);

impl Processor for Min {
    fn add(&mut self, value: f64, _ts: u64) {
        self.0 = self.0.min(value);
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("min", self.0)
    }
}

pub fn create_min() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> { Box::new(Min(value)) })
}

struct Percentiles(Vec<f64>);

impl Processor for Percentiles {
    fn add(&mut self, value: f64, _ts: u64) {
        self.0.push(value);
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        let mut values = self.0;
        values.sort_unstable_by(|a, b| a.total_cmp(b));

        let results = PERCENTILES
            .iter()
            .map(|(name, rank)| ProcessorResult::new(*name, nearest_rank(&values, *rank)))
            .collect();
        Some(results)
    }
}

/// Nearest-rank percentile of sorted, non-empty `values`.
fn nearest_rank(values: &[f64], rank: f64) -> f64 {
    let ordinal = (rank * values.len() as f64 / 100.0).ceil() as usize;
    values[ordinal.clamp(1, values.len()) - 1]
}

/// Multi-result function reporting p25, p50, p75, p90, p95 and p99.
pub fn create_percentiles() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> {
        Box::new(Percentiles(vec![value]))
    })
}

/// Welford running variance.
struct Stdev {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Processor for Stdev {
    fn add(&mut self, value: f64, _ts: u64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("stdev", (self.m2 / self.count as f64).sqrt())
    }
}

/// Population standard deviation.
pub fn create_stdev() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> {
        Box::new(Stdev {
            count: 1,
            mean: value,
            m2: 0.0,
        })
    })
}

struct Sum(f64);

impl Processor for Sum {
    fn add(&mut self, value: f64, _ts: u64) {
        self.0 += value;
    }

    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>> {
        single("sum", self.0)
    }
}

pub fn create_sum() -> ProcessorConstructor {
    Arc::new(|value: f64, _ts: u64| -> Box<dyn Processor> { Box::new(Sum(value)) })
}
