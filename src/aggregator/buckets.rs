//! Two-level bucket table and ordered flush.
//!
//! Buckets are keyed by quantized timestamp first and output key second. A
//! separate list of the live quantized timestamps, kept ascending, lets
//! [`BucketStore::flush_due`] walk windows oldest first and stop at the first
//! one that is not due yet.
//!
//! The store is owned by a single worker thread and is not synchronized.

use crate::matcher::OutputKey;
use crate::metrics::AggregatorMetrics;
use crate::processor::{Processor, ProcessorConstructor};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Placeholder standing in for accumulator state in structural copies.
///
/// Serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Vacant;

/// Key structure of the store: quantized timestamp → output key → placeholder.
pub type BucketLayout = BTreeMap<u64, BTreeMap<String, Vacant>>;

/// One output line produced by flushing a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushedRecord {
    pub key: OutputKey,
    /// Result name, present only when the processor yielded several results
    pub result: Option<String>,
    pub value: f64,
    /// Quantized timestamp of the bucket
    pub timestamp: u64,
}

impl FlushedRecord {
    /// Carbon plaintext form without a trailing newline.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for FlushedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Some(result) => write!(
                f,
                "{}.{} {:.6} {}",
                self.key, result, self.value, self.timestamp
            ),
            None => write!(f, "{} {:.6} {}", self.key, self.value, self.timestamp),
        }
    }
}

/// Open buckets of one aggregator.
pub struct BucketStore {
    interval: u64,
    wait: u64,
    constructor: ProcessorConstructor,
    /// Aggregations in progress, one per quantized timestamp and output key
    aggregations: HashMap<u64, HashMap<OutputKey, Box<dyn Processor>>>,
    /// Quantized timestamps present in `aggregations`, ascending
    ts_list: Vec<u64>,
    metrics: Arc<AggregatorMetrics>,
}

impl BucketStore {
    pub fn new(
        interval: u64,
        wait: u64,
        constructor: ProcessorConstructor,
        metrics: Arc<AggregatorMetrics>,
    ) -> Self {
        Self {
            interval: interval.max(1),
            wait,
            constructor,
            aggregations: HashMap::new(),
            ts_list: Vec::new(),
            metrics,
        }
    }

    /// Round `ts` down to a multiple of the interval.
    pub fn quantize(&self, ts: u64) -> u64 {
        ts - ts % self.interval
    }

    /// Add a sample to its bucket, creating the bucket if it is still admissible.
    ///
    /// An existing bucket accepts samples regardless of age. A new bucket is
    /// only created when `quantized > now - wait`; otherwise the sample is
    /// counted as too old and `false` is returned. As long as `now` never
    /// decreases this guarantees a flushed bucket is never re-created.
    pub fn insert_or_accumulate(
        &mut self,
        key: &OutputKey,
        ts: u64,
        quantized: u64,
        value: f64,
        now: u64,
    ) -> bool {
        if let Some(proc) = self
            .aggregations
            .get_mut(&quantized)
            .and_then(|by_key| by_key.get_mut(key))
        {
            proc.add(value, ts);
            return true;
        }

        if quantized <= now.saturating_sub(self.wait) {
            self.metrics.record_too_old();
            return false;
        }

        let proc = (self.constructor)(value, ts);
        match self.aggregations.get_mut(&quantized) {
            Some(by_key) => {
                by_key.insert(key.clone(), proc);
            }
            None => {
                let mut by_key = HashMap::new();
                by_key.insert(key.clone(), proc);
                self.aggregations.insert(quantized, by_key);

                self.ts_list.push(quantized);
                let len = self.ts_list.len();
                if len > 1 && self.ts_list[len - 2] > quantized {
                    self.ts_list.sort_unstable();
                }
            }
        }
        true
    }

    /// Flush and remove every bucket with quantized timestamp `<= cutoff`.
    ///
    /// Buckets are flushed in ascending timestamp order; output keys within a
    /// timestamp come in no particular order. Processors that decline to
    /// produce output are skipped. Returns the number of timestamps flushed.
    pub fn flush_due<F>(&mut self, cutoff: u64, mut emit: F) -> usize
    where
        F: FnMut(FlushedRecord),
    {
        let mut processed = 0;
        for &ts in &self.ts_list {
            if ts > cutoff {
                break;
            }
            if let Some(by_key) = self.aggregations.remove(&ts) {
                for (key, proc) in by_key {
                    let Some(results) = proc.flush() else {
                        continue;
                    };
                    if results.len() == 1 {
                        emit(FlushedRecord {
                            key,
                            result: None,
                            value: results[0].value,
                            timestamp: ts,
                        });
                    } else {
                        for result in results {
                            emit(FlushedRecord {
                                key: key.clone(),
                                result: Some(result.name),
                                value: result.value,
                                timestamp: ts,
                            });
                        }
                    }
                }
            }
            processed += 1;
        }

        if processed > 0 {
            // keeps the backing allocation
            self.ts_list.drain(..processed);
        }
        processed
    }

    /// Copy of the key structure with every processor replaced by [`Vacant`].
    pub fn layout(&self) -> BucketLayout {
        self.aggregations
            .iter()
            .map(|(ts, by_key)| {
                let keys: BTreeMap<String, Vacant> =
                    by_key.keys().map(|k| (k.to_string(), Vacant)).collect();
                (*ts, keys)
            })
            .collect()
    }

    /// Live quantized timestamps, ascending.
    pub fn timestamps(&self) -> &[u64] {
        &self.ts_list
    }

    /// Number of open (timestamp, key) buckets.
    pub fn len(&self) -> usize {
        self.aggregations.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ts_list.is_empty()
    }
}

impl fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketStore")
            .field("interval", &self.interval)
            .field("wait", &self.wait)
            .field("ts_list", &self.ts_list)
            .field("buckets", &self.len())
            .finish()
    }
}
