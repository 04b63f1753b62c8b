//! Pluggable per-bucket reductions.
//!
//! Every open bucket owns one [`Processor`]. It is created from the first
//! sample of its window, fed every later sample, and flushed exactly once when
//! the window closes. Reductions are looked up by name in a
//! [`ProcessorRegistry`], which comes pre-populated with the functions in
//! [`defaults`] and accepts custom registrations.
//!
//! ## Example
//!
//! ```rust
//! use metric_aggregator::processor::ProcessorRegistry;
//!
//! let registry = ProcessorRegistry::with_defaults();
//! let sum = registry.get("sum")?;
//!
//! let mut proc = sum(1.0, 100);
//! proc.add(2.0, 101);
//! proc.add(3.0, 109);
//!
//! let results = proc.flush().unwrap();
//! assert_eq!(results[0].value, 6.0);
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```

pub mod defaults;

pub use defaults::register_defaults;

use crate::error::{AggregatorError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One named output of a flushed processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorResult {
    /// Function name, used as the key suffix when a processor yields several results
    pub name: String,
    pub value: f64,
}

impl ProcessorResult {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Accumulation state for one (quantized timestamp, output key) bucket.
pub trait Processor: Send {
    /// Add a sample to the bucket.
    fn add(&mut self, value: f64, ts: u64);

    /// Produce the final results, or `None` if the processor declines to emit
    /// anything (for example because it saw too few samples).
    fn flush(self: Box<Self>) -> Option<Vec<ProcessorResult>>;
}

/// Builds a processor seeded with the first sample of a bucket.
pub type ProcessorConstructor = Arc<dyn Fn(f64, u64) -> Box<dyn Processor> + Send + Sync>;

/// Registry of reduction functions by name.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    constructors: HashMap<String, ProcessorConstructor>,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry containing every built-in function.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_defaults(&mut registry);
        registry
    }

    /// Register (or replace) a function under `name`.
    pub fn register(&mut self, name: impl Into<String>, constructor: ProcessorConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Look up the constructor for `name`.
    pub fn get(&self, name: &str) -> Result<ProcessorConstructor> {
        self.constructors
            .get(name)
            .cloned()
            .ok_or_else(|| AggregatorError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered function names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
