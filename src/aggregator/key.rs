//! Stable short identity for an aggregator definition.

use crate::config::AggregatorConfig;
use md5::{Digest, Md5};

/// Length of the hex identity key.
pub const KEY_LEN: usize = 7;

/// First seven hex digits of the MD5 of the identity fields.
///
/// The fields are the function name, regex, configured prefix (empty when
/// none), substring (empty when none) and output format, each terminated by a
/// NUL byte except the last. Interval, wait, cache and drop-raw do not take
/// part, so aggregators differing only in those share a key.
pub fn aggregator_key(config: &AggregatorConfig) -> String {
    let mut hasher = Md5::new();
    hasher.update(config.function.as_bytes());
    hasher.update([0u8]);
    hasher.update(config.regex.as_bytes());
    hasher.update([0u8]);
    hasher.update(config.prefix.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8]);
    hasher.update(config.substring.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8]);
    hasher.update(config.format.as_bytes());

    let mut key = format!("{:x}", hasher.finalize());
    key.truncate(KEY_LEN);
    key
}
