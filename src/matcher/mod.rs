//! Metric name selection.
//!
//! Deciding whether a sample belongs to an aggregator happens in three layers,
//! cheapest first:
//!
//! - [`PreFilter`] - literal prefix and substring checks on the raw name
//! - [`MatchCache`] - remembered outcomes for names seen recently
//! - [`PatternMatcher`] - full regex match and output key expansion
//!
//! [`Matcher`] composes the three and is shared between producer threads and
//! the aggregator worker.
//!
//! ## Example Usage
//!
//! ```rust
//! use metric_aggregator::clock::SystemClock;
//! use metric_aggregator::matcher::Matcher;
//! use std::sync::Arc;
//!
//! let matcher = Matcher::new(
//!     r"^servers\.([^.]+)\.cpu$",
//!     None,
//!     None,
//!     "cpu.$1",
//!     true,
//!     Arc::new(SystemClock),
//! )?;
//!
//! assert!(matcher.pre_match(b"servers.web1.cpu"));
//! assert_eq!(matcher.match_with_cache(b"servers.web1.cpu").as_deref(), Some("cpu.web1"));
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```

pub mod cache;
pub mod pattern;
pub mod prefilter;
pub mod prefix;

pub use cache::{CacheEntry, CacheStats, MatchCache, OutputKey};
pub use pattern::PatternMatcher;
pub use prefilter::PreFilter;
pub use prefix::regex_to_prefix;

use crate::clock::Clock;
use crate::error::Result;
use std::sync::Arc;

/// Pre-filter, optional cache and full pattern for one aggregator.
#[derive(Debug)]
pub struct Matcher {
    prefilter: PreFilter,
    pattern: PatternMatcher,
    cache: Option<MatchCache>,
}

impl Matcher {
    pub fn new(
        regex: &str,
        prefix: Option<&str>,
        substring: Option<&str>,
        format: &str,
        cache: bool,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            prefilter: PreFilter::new(regex, prefix, substring)?,
            pattern: PatternMatcher::new(regex, format)?,
            cache: cache.then(|| MatchCache::new(clock)),
        })
    }

    /// Checks the literal prefix and substring constraints only.
    pub fn pre_match(&self, name: &[u8]) -> bool {
        self.prefilter.matches(name)
    }

    /// Full match, answered from the cache when caching is enabled.
    pub fn match_with_cache(&self, name: &[u8]) -> Option<OutputKey> {
        match &self.cache {
            Some(cache) => cache.get_or_match(name, |name| self.pattern.match_name(name)),
            None => self.pattern.match_name(name).map(Into::into),
        }
    }

    pub fn prefilter(&self) -> &PreFilter {
        &self.prefilter
    }

    pub fn pattern(&self) -> &PatternMatcher {
        &self.pattern
    }

    pub fn cache(&self) -> Option<&MatchCache> {
        self.cache.as_ref()
    }
}
