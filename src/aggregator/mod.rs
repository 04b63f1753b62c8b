//! Streaming windowed aggregation.
//!
//! An [`Aggregator`] selects samples by metric name, groups them into
//! fixed-width time windows per output key, reduces each group with a
//! processor and writes one carbon line per result once the window's grace
//! period has passed.
//!
//! Producers call [`Aggregator::submit`] from any thread. Matched samples are
//! queued to a dedicated worker thread that owns all bucket state; flushes
//! are driven by the tick source in [`RuntimeOptions`].
//!
//! ## Example
//!
//! ```rust
//! use metric_aggregator::clock::{system_time, ManualClock};
//! use metric_aggregator::{Aggregator, AggregatorConfig, RuntimeOptions};
//! use std::sync::Arc;
//!
//! let config = AggregatorConfig::new("sum", r"^app\.requests\.", "app.requests.total", 10, 5);
//! let (out_tx, out_rx) = crossbeam_channel::unbounded();
//! let (tick_tx, tick_rx) = crossbeam_channel::unbounded();
//! let clock = ManualClock::new(100);
//!
//! let aggregator = Aggregator::with_options(
//!     config,
//!     out_tx,
//!     RuntimeOptions::with_tick(Arc::new(clock), tick_rx),
//! )?;
//!
//! aggregator.submit(b"app.requests.a", 1.0, 100);
//! aggregator.submit(b"app.requests.b", 2.0, 101);
//! aggregator.submit(b"app.requests.a", 3.0, 109);
//! tick_tx.send(system_time(116)).unwrap();
//!
//! let line = out_rx.recv().unwrap();
//! assert_eq!(line, b"app.requests.total 6.000000 100");
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```

pub mod buckets;
pub mod key;
pub mod snapshot;
mod worker;

pub use buckets::{BucketLayout, BucketStore, FlushedRecord, Vacant};
pub use key::aggregator_key;
pub use snapshot::Snapshot;
pub use worker::CACHE_MAX_AGE_FACTOR;

use crate::config::{AggregatorConfig, RuntimeOptions};
use crate::datapoint::Datapoint;
use crate::error::{AggregatorError, Result};
use crate::matcher::Matcher;
use crate::metrics::{AggregatorMetrics, MetricsSnapshot};
use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use worker::{Channels, Control, Sample, Worker};

/// Handle to a running aggregator.
///
/// Dropping the handle shuts the aggregator down, flushing every bucket that
/// is due.
#[derive(Debug)]
pub struct Aggregator {
    key: String,
    config: Arc<AggregatorConfig>,
    matcher: Arc<Matcher>,
    metrics: Arc<AggregatorMetrics>,
    inbound: Sender<Sample>,
    control: Sender<Control>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Aggregator {
    /// Start an aggregator with the system clock and an aligned ticker.
    ///
    /// Output lines are sent to `out`; records are dropped with an error log
    /// if its receiver has gone away.
    pub fn new(config: AggregatorConfig, out: Sender<Vec<u8>>) -> Result<Self> {
        let options = RuntimeOptions::system(&config);
        Self::with_options(config, out, options)
    }

    /// Start an aggregator with explicit collaborators.
    ///
    /// Fails without starting anything if the configuration is invalid, the
    /// regex does not compile or the function is unknown.
    pub fn with_options(
        config: AggregatorConfig,
        out: Sender<Vec<u8>>,
        options: RuntimeOptions,
    ) -> Result<Self> {
        config.validate()?;
        let matcher = Arc::new(Matcher::new(
            &config.regex,
            config.prefix.as_deref(),
            config.substring.as_deref(),
            &config.format,
            config.cache,
            options.clock.clone(),
        )?);
        let constructor = options.registry.get(&config.function)?;

        let key = aggregator_key(&config);
        let config = Arc::new(config);
        let metrics = Arc::new(AggregatorMetrics::new());
        let store = BucketStore::new(
            config.interval,
            config.wait,
            constructor,
            metrics.clone(),
        );

        let (inbound_tx, inbound_rx) = bounded(options.queue_size);
        let (control_tx, control_rx) = unbounded();
        let worker = Worker::new(
            key.clone(),
            config.clone(),
            matcher.clone(),
            store,
            options.clock,
            metrics.clone(),
            out,
        );
        let channels = Channels {
            inbound: inbound_rx,
            tick: options.tick,
            control: control_rx,
        };

        let handle = thread::Builder::new()
            .name(format!("aggregator-{key}"))
            .spawn(move || worker.run(channels))?;

        tracing::info!(
            aggregator = %key,
            function = %config.function,
            regex = %config.regex,
            interval = config.interval,
            wait = config.wait,
            "aggregator started"
        );

        Ok(Self {
            key,
            config,
            matcher,
            metrics,
            inbound: inbound_tx,
            control: control_tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Seven hex digit identity of this aggregator's definition.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Cheap check of the literal prefix and substring constraints.
    ///
    /// A `true` result does not mean the regex matches.
    pub fn pre_match(&self, name: &[u8]) -> bool {
        self.matcher.pre_match(name)
    }

    /// Offer a raw sample.
    ///
    /// Returns `true` when the caller should treat the sample as consumed and
    /// not forward it, which only happens with drop-raw enabled and a full
    /// match. Blocks while the inbound queue is full. After shutdown nothing
    /// is consumed and `false` is returned.
    pub fn submit(&self, name: &[u8], value: f64, ts: u64) -> bool {
        if !self.matcher.pre_match(name) {
            return false;
        }
        if self.config.drop_raw && self.matcher.match_with_cache(name).is_none() {
            return false;
        }

        let sample = Sample {
            name: name.to_vec(),
            value,
            ts,
        };
        if self.inbound.send(sample).is_err() {
            tracing::debug!(aggregator = %self.key, "sample submitted after shutdown");
            return false;
        }
        self.config.drop_raw
    }

    /// [`submit`](Self::submit) for a parsed datapoint.
    pub fn submit_datapoint(&self, datapoint: &Datapoint) -> bool {
        self.submit(&datapoint.name, datapoint.value, datapoint.timestamp)
    }

    /// Structural copy of the open buckets, taken between samples.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let (reply_tx, reply_rx) = bounded(1);
        self.control
            .send(Control::Snapshot(reply_tx))
            .map_err(|_| AggregatorError::Stopped)?;
        reply_rx.recv().map_err(|_| AggregatorError::Stopped)
    }

    /// Counter values for this aggregator.
    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(&self.key, self.matcher.cache().map(|cache| cache.stats()))
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Stop the worker and wait for the final flush.
    ///
    /// Samples already queued are aggregated, then every bucket with
    /// timestamp at or before `now - wait` is flushed. Later buckets are
    /// discarded. Calling this again, from any thread, returns immediately
    /// once the first call has completed.
    pub fn shutdown(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        // the worker may already be gone if its thread panicked
        let _ = self.control.send(Control::Shutdown);
        if handle.join().is_err() {
            tracing::error!(aggregator = %self.key, "aggregator worker panicked");
        }
        tracing::debug!(aggregator = %self.key, "aggregator shut down");
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
