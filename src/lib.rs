//! # Metric Aggregator
//!
//! A streaming aggregation engine for [carbon plaintext](https://graphite.readthedocs.io/en/latest/feeding-carbon.html)
//! metrics. Each aggregator selects input series by name, groups their samples
//! into fixed-width time windows per output key, reduces each group with a
//! function such as `sum`, `avg` or `percentiles`, and emits the result once
//! the window's grace period has passed.
//!
//! ## Quick Start
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use metric_aggregator::{Aggregator, AggregatorConfig};
//!
//! let config = AggregatorConfig::from_yaml(
//!     r#"
//! function: avg
//! regex: '^servers\.([^.]+)\.cpu$'
//! format: 'cpu.avg.$1'
//! interval: 60
//! wait: 120
//! "#,
//! )?;
//!
//! let (out_tx, out_rx) = crossbeam_channel::unbounded();
//! let aggregator = Aggregator::new(config, out_tx)?;
//!
//! // returns true only when drop-raw is enabled and the name matched
//! let consumed = aggregator.submit(b"servers.web1.cpu", 0.73, 1_700_000_000);
//! assert!(!consumed);
//!
//! // lines such as "cpu.avg.web1 0.730000 1699999980" arrive after interval + wait
//! for line in out_rx.iter() {
//!     println!("{}", String::from_utf8_lossy(&line));
//! }
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```
//!
//! ### Deterministic Time
//!
//! Tests and replays drive time explicitly with a [`clock::ManualClock`] and
//! their own tick channel:
//!
//! ```rust
//! use metric_aggregator::clock::{system_time, ManualClock};
//! use metric_aggregator::{Aggregator, AggregatorConfig, RuntimeOptions};
//! use std::sync::Arc;
//!
//! let config = AggregatorConfig::new("percentiles", r"^lat\.(\w+)$", "lat.$1", 10, 5);
//! let (out_tx, out_rx) = crossbeam_channel::unbounded();
//! let (tick_tx, tick_rx) = crossbeam_channel::unbounded();
//! let options = RuntimeOptions::with_tick(Arc::new(ManualClock::new(100)), tick_rx);
//!
//! let aggregator = Aggregator::with_options(config, out_tx, options)?;
//! aggregator.submit(b"lat.api", 12.0, 101);
//! tick_tx.send(system_time(120)).unwrap();
//!
//! let first = out_rx.recv().unwrap();
//! assert_eq!(first, b"lat.api.p25 12.000000 100");
//! # Ok::<(), metric_aggregator::AggregatorError>(())
//! ```

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod datapoint;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod processor;

// Primary interface
pub use aggregator::{aggregator_key, Aggregator, FlushedRecord, Snapshot};

// Configuration
pub use config::{AggregatorConfig, RuntimeOptions, DEFAULT_QUEUE_SIZE};

// Core types and errors
pub use datapoint::Datapoint;
pub use error::{AggregatorError, Result};
pub use metrics::MetricsSnapshot;

// Reduction functions
pub use processor::{Processor, ProcessorConstructor, ProcessorRegistry, ProcessorResult};

// Name matching
pub use matcher::{Matcher, OutputKey};
