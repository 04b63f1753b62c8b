//! Operational counters for an aggregator instance.
//!
//! Counters are increment-only atomics so that producer threads and the worker
//! loop can update them without locking. [`MetricsSnapshot`] is a point-in-time
//! copy labelled with the aggregator key, suitable for serialization.

use crate::matcher::CacheStats;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the aggregator handle and its worker.
#[derive(Debug)]
pub struct AggregatorMetrics {
    /// Matched samples handed to the bucket store
    samples_in: AtomicU64,
    /// Output records written to the output channel
    samples_flushed: AtomicU64,
    /// Samples rejected because their window had already closed
    samples_too_old: AtomicU64,
    /// Flush passes run, whether or not anything was due
    flushes: AtomicU64,
    /// Smallest sample timestamp seen (`u64::MAX` until the first sample)
    min_timestamp: AtomicU64,
    /// Largest sample timestamp seen
    max_timestamp: AtomicU64,
}

impl Default for AggregatorMetrics {
    fn default() -> Self {
        Self {
            samples_in: AtomicU64::new(0),
            samples_flushed: AtomicU64::new(0),
            samples_too_old: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            min_timestamp: AtomicU64::new(u64::MAX),
            max_timestamp: AtomicU64::new(0),
        }
    }
}

impl AggregatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a matched sample and its timestamp.
    pub fn record_in(&self, ts: u64) {
        self.samples_in.fetch_add(1, Ordering::Relaxed);
        self.min_timestamp.fetch_min(ts, Ordering::Relaxed);
        self.max_timestamp.fetch_max(ts, Ordering::Relaxed);
    }

    pub fn record_flushed(&self, records: u64) {
        self.samples_flushed.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_too_old(&self) {
        self.samples_too_old.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_in(&self) -> u64 {
        self.samples_in.load(Ordering::Relaxed)
    }

    pub fn samples_flushed(&self) -> u64 {
        self.samples_flushed.load(Ordering::Relaxed)
    }

    pub fn samples_too_old(&self) -> u64 {
        self.samples_too_old.load(Ordering::Relaxed)
    }

    /// Take a labelled snapshot of all counters.
    pub fn snapshot(&self, key: &str, cache: Option<CacheStats>) -> MetricsSnapshot {
        let min = self.min_timestamp.load(Ordering::Relaxed);
        let max = self.max_timestamp.load(Ordering::Relaxed);
        let cache = cache.unwrap_or_default();

        MetricsSnapshot {
            aggregator: key.to_string(),
            samples_in: self.samples_in(),
            samples_flushed: self.samples_flushed(),
            samples_too_old: self.samples_too_old(),
            flushes: self.flushes.load(Ordering::Relaxed),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_evictions: cache.evictions,
            timestamp_range: (min != u64::MAX).then_some((min, max)),
        }
    }
}

/// Point-in-time counter values for one aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Aggregator key the counters belong to
    pub aggregator: String,
    pub samples_in: u64,
    pub samples_flushed: u64,
    pub samples_too_old: u64,
    pub flushes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    /// Oldest and newest sample timestamps seen, if any
    pub timestamp_range: Option<(u64, u64)>,
}

impl MetricsSnapshot {
    /// Metric names in the `unit=Metric.direction=...` style used for
    /// carbon self-reporting, paired with their values.
    pub fn carbon_counters(&self) -> Vec<(String, u64)> {
        vec![
            (
                format!("unit=Metric.direction=in.aggregator={}", self.aggregator),
                self.samples_in,
            ),
            (
                format!("unit=Metric.direction=out.aggregator={}", self.aggregator),
                self.samples_flushed,
            ),
            (
                format!("unit=Metric.direction=too_old.aggregator={}", self.aggregator),
                self.samples_too_old,
            ),
        ]
    }
}
