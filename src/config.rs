//! Aggregator configuration.
//!
//! [`AggregatorConfig`] is the immutable identity of one aggregator: which
//! metrics it selects, how it names its output, which reduction it applies
//! and how it windows time. [`RuntimeOptions`] carries the collaborators an
//! instance runs with (queue size, clock, flush ticks, processor registry),
//! which tests replace with deterministic ones.
//!
//! # Examples
//!
//! ```rust
//! use metric_aggregator::AggregatorConfig;
//!
//! let config = AggregatorConfig::from_yaml(
//!     r#"
//! function: sum
//! regex: '^app\.requests\.'
//! format: app.requests.total
//! interval: 10
//! wait: 5
//! "#,
//! )?;
//!
//! assert_eq!(config.function, "sum");
//! assert!(config.cache);
//! assert!(!config.drop_raw);
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```

use crate::clock::{aligned_tick, Clock, SystemClock};
use crate::error::{AggregatorError, Result};
use crate::processor::ProcessorRegistry;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Default capacity of the inbound sample queue.
pub const DEFAULT_QUEUE_SIZE: usize = 2000;

/// Identity and windowing parameters of one aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Name of the reduction function (`sum`, `avg`, `percentiles`, ...).
    #[serde(alias = "fun")]
    pub function: String,

    /// Pattern selecting input metric names. Captures feed `format`.
    pub regex: String,

    /// Required literal prefix.
    ///
    /// When absent, a prefix is derived from the regex if it is anchored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Required substring, checked before the regex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substring: Option<String>,

    /// Output key template, e.g. `stats.$1.total` or `stats.${host}.total`.
    #[serde(alias = "outFmt")]
    pub format: String,

    /// Cache match outcomes per raw metric name.
    ///
    /// **Default**: true
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Window width in seconds. Sample timestamps are quantized down to a
    /// multiple of this value.
    pub interval: u64,

    /// Grace period in seconds after a window's start before it is flushed
    /// and closed to new buckets.
    pub wait: u64,

    /// Consume matching raw samples instead of letting the caller forward them.
    ///
    /// **Default**: false
    #[serde(default, alias = "dropRaw")]
    pub drop_raw: bool,
}

fn default_cache() -> bool {
    true
}

impl AggregatorConfig {
    /// Create a configuration with caching enabled and drop-raw disabled.
    pub fn new(
        function: impl Into<String>,
        regex: impl Into<String>,
        format: impl Into<String>,
        interval: u64,
        wait: u64,
    ) -> Self {
        Self {
            function: function.into(),
            regex: regex.into(),
            prefix: None,
            substring: None,
            format: format.into(),
            cache: true,
            interval,
            wait,
            drop_raw: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_substring(mut self, substring: impl Into<String>) -> Self {
        self.substring = Some(substring.into());
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_drop_raw(mut self, drop_raw: bool) -> Self {
        self.drop_raw = drop_raw;
        self
    }

    /// Parse a single aggregator definition from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a single aggregator definition from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Parse a YAML sequence of aggregator definitions.
    pub fn load_all(yaml: &str) -> Result<Vec<Self>> {
        let configs: Vec<Self> = serde_yaml::from_str(yaml)?;
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }

    /// Check the parameters that cannot be caught by the regex compiler or
    /// the processor registry.
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(AggregatorError::InvalidConfig(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.regex.is_empty() {
            return Err(AggregatorError::InvalidConfig(
                "regex must not be empty".to_string(),
            ));
        }
        if self.function.is_empty() {
            return Err(AggregatorError::InvalidConfig(
                "function must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Collaborators an aggregator runs with.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Capacity of the inbound queue; producers block when it is full.
    ///
    /// **Default**: 2000
    pub queue_size: usize,

    /// Source of "now" for admission, cache timestamps and shutdown.
    pub clock: Arc<dyn Clock>,

    /// Flush ticks. Each received time triggers a flush with cutoff
    /// `tick - wait`.
    pub tick: Receiver<SystemTime>,

    /// Where reduction functions are looked up.
    pub registry: Arc<ProcessorRegistry>,
}

impl RuntimeOptions {
    /// Production collaborators: system clock, built-in functions and a
    /// ticker aligned to `interval` boundaries, offset by `wait`.
    pub fn system(config: &AggregatorConfig) -> Self {
        let tick = aligned_tick(
            Duration::from_secs(config.interval),
            Duration::from_secs(config.wait),
        );
        Self::with_tick(Arc::new(SystemClock), tick)
    }

    /// Custom clock and tick source with the built-in functions.
    pub fn with_tick(clock: Arc<dyn Clock>, tick: Receiver<SystemTime>) -> Self {
        Self {
            queue_size: DEFAULT_QUEUE_SIZE,
            clock,
            tick,
            registry: Arc::new(ProcessorRegistry::with_defaults()),
        }
    }

    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn registry(mut self, registry: Arc<ProcessorRegistry>) -> Self {
        self.registry = registry;
        self
    }
}
