//! Structural copy of an aggregator's open buckets.

use super::buckets::{BucketLayout, Vacant};
use crate::config::AggregatorConfig;
use serde::Serialize;

/// Identity of an aggregator plus the shape of its open buckets.
///
/// Accumulator state is replaced with [`Vacant`], so a snapshot shows which
/// (timestamp, output key) buckets exist without exposing partial results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub key: String,
    #[serde(flatten)]
    pub config: AggregatorConfig,
    /// Literal prefix in effect, configured or derived from the regex
    pub effective_prefix: String,
    pub aggregations: BucketLayout,
}

impl Snapshot {
    /// Open quantized timestamps, ascending.
    pub fn timestamps(&self) -> Vec<u64> {
        self.aggregations.keys().copied().collect()
    }

    /// Output keys with an open bucket at `ts`, sorted.
    pub fn keys_at(&self, ts: u64) -> Vec<&str> {
        self.aggregations
            .get(&ts)
            .map(|keys| keys.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of open (timestamp, key) buckets.
    pub fn bucket_count(&self) -> usize {
        self.aggregations.values().map(|keys| keys.len()).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
