//! The per-aggregator worker loop.
//!
//! One thread owns the [`BucketStore`] and serializes every mutation of it:
//! matched samples, flush ticks, snapshot requests and shutdown all arrive as
//! channel messages and are handled one at a time.
//!
//! Before a tick or control message is handled, samples already waiting in
//! the inbound queue are aggregated. A sample whose submission completed
//! before a snapshot was requested is therefore always visible in it.

use super::buckets::{BucketStore, FlushedRecord};
use super::snapshot::Snapshot;
use crate::clock::{unix_seconds, Clock};
use crate::config::AggregatorConfig;
use crate::matcher::Matcher;
use crate::metrics::AggregatorMetrics;
use crossbeam_channel::{never, select, Receiver, Sender};
use std::sync::Arc;
use std::time::SystemTime;

/// Age, in multiples of `wait`, after which cached match outcomes are evicted.
pub const CACHE_MAX_AGE_FACTOR: u64 = 100;

/// A raw sample handed from a producer to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: Vec<u8>,
    pub value: f64,
    pub ts: u64,
}

/// Requests from the handle to the worker.
#[derive(Debug)]
pub enum Control {
    Snapshot(Sender<Snapshot>),
    Shutdown,
}

/// Inputs the worker selects over.
#[derive(Debug)]
pub struct Channels {
    pub inbound: Receiver<Sample>,
    pub tick: Receiver<SystemTime>,
    pub control: Receiver<Control>,
}

pub struct Worker {
    key: String,
    config: Arc<AggregatorConfig>,
    matcher: Arc<Matcher>,
    store: BucketStore,
    clock: Arc<dyn Clock>,
    metrics: Arc<AggregatorMetrics>,
    out: Sender<Vec<u8>>,
    /// Largest time observed from the clock or a tick; never decreases
    watermark: u64,
}

impl Worker {
    pub fn new(
        key: String,
        config: Arc<AggregatorConfig>,
        matcher: Arc<Matcher>,
        store: BucketStore,
        clock: Arc<dyn Clock>,
        metrics: Arc<AggregatorMetrics>,
        out: Sender<Vec<u8>>,
    ) -> Self {
        Self {
            key,
            config,
            matcher,
            store,
            clock,
            metrics,
            out,
            watermark: 0,
        }
    }

    /// Run until shutdown is requested or the handle goes away.
    pub fn run(mut self, channels: Channels) {
        let Channels {
            inbound,
            mut tick,
            control,
        } = channels;

        tracing::debug!(aggregator = %self.key, "aggregator worker started");

        loop {
            let mut tick_closed = false;
            select! {
                recv(inbound) -> sample => match sample {
                    Ok(sample) => self.handle_sample(sample),
                    Err(_) => break,
                },
                recv(tick) -> at => match at {
                    Ok(at) => {
                        self.drain_pending(&inbound);
                        self.handle_tick(at);
                    }
                    Err(_) => tick_closed = true,
                },
                recv(control) -> request => match request {
                    Ok(Control::Snapshot(reply)) => {
                        self.drain_pending(&inbound);
                        // the requester may have given up waiting
                        let _ = reply.send(self.snapshot());
                    }
                    Ok(Control::Shutdown) | Err(_) => break,
                },
            }
            if tick_closed {
                tracing::debug!(aggregator = %self.key, "tick source closed");
                tick = never();
            }
        }

        self.finish(&inbound);
    }

    /// Aggregate the samples queued right now, but no more.
    ///
    /// Producers that keep submitting cannot starve ticks and control
    /// messages this way.
    fn drain_pending(&mut self, inbound: &Receiver<Sample>) {
        let pending = inbound.len();
        for sample in inbound.try_iter().take(pending) {
            self.handle_sample(sample);
        }
    }

    fn handle_sample(&mut self, sample: Sample) {
        let Some(key) = self.matcher.match_with_cache(&sample.name) else {
            return;
        };
        self.metrics.record_in(sample.ts);

        let quantized = self.store.quantize(sample.ts);
        let now = self.observe(self.clock.now());
        if !self
            .store
            .insert_or_accumulate(&key, sample.ts, quantized, sample.value, now)
        {
            tracing::warn!(
                aggregator = %self.key,
                name = %String::from_utf8_lossy(&sample.name),
                ts = sample.ts,
                quantized,
                value = sample.value,
                "aggregator received too old sample"
            );
        }
    }

    fn handle_tick(&mut self, at: SystemTime) {
        let at = unix_seconds(at);
        self.observe(at);
        self.flush(at.saturating_sub(self.config.wait));

        if let Some(cache) = self.matcher.cache() {
            let max_age = self.config.wait.saturating_mul(CACHE_MAX_AGE_FACTOR);
            let evicted = cache.evict_older_than(at, max_age);
            if evicted > 0 {
                tracing::debug!(
                    aggregator = %self.key,
                    evicted,
                    remaining = cache.len(),
                    "evicted stale match cache entries"
                );
            }
        }
    }

    /// Fold a time reading into the watermark and return the new watermark.
    fn observe(&mut self, now: u64) -> u64 {
        self.watermark = self.watermark.max(now);
        self.watermark
    }

    fn flush(&mut self, cutoff: u64) {
        let out = &self.out;
        let mut sent = 0u64;
        let mut dropped = 0u64;

        let flushed = self.store.flush_due(cutoff, |record: FlushedRecord| {
            if out.send(record.to_bytes()).is_ok() {
                sent += 1;
            } else {
                dropped += 1;
            }
        });

        self.metrics.record_flush();
        self.metrics.record_flushed(sent);
        if dropped > 0 {
            tracing::error!(
                aggregator = %self.key,
                dropped,
                "output channel closed, dropping aggregated records"
            );
        }
        if flushed > 0 {
            tracing::debug!(aggregator = %self.key, cutoff, flushed, sent, "flushed buckets");
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            key: self.key.clone(),
            config: self.config.as_ref().clone(),
            effective_prefix: String::from_utf8_lossy(self.matcher.prefilter().prefix())
                .into_owned(),
            aggregations: self.store.layout(),
        }
    }

    /// Drain what was already queued, flush everything due and stop.
    fn finish(&mut self, inbound: &Receiver<Sample>) {
        self.drain_pending(inbound);

        let now = self.observe(self.clock.now());
        self.flush(now.saturating_sub(self.config.wait));

        let discarded = self.store.len();
        if discarded > 0 {
            tracing::debug!(
                aggregator = %self.key,
                discarded,
                "discarding buckets not yet due at shutdown"
            );
        }
        tracing::debug!(aggregator = %self.key, "aggregator worker stopped");
    }
}
