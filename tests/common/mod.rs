//! Shared harness for aggregator integration tests.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use metric_aggregator::clock::{system_time, ManualClock};
use metric_aggregator::{Aggregator, AggregatorConfig, RuntimeOptions};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

/// An aggregator driven by a manual clock and a test-owned tick channel.
pub struct TestAggregator {
    pub aggregator: Aggregator,
    pub clock: ManualClock,
    pub tick: Sender<SystemTime>,
    pub out: Receiver<Vec<u8>>,
}

impl TestAggregator {
    pub fn start(config: AggregatorConfig, now: u64) -> anyhow::Result<Self> {
        Self::start_with(config, now, |options| options)
    }

    pub fn start_with(
        config: AggregatorConfig,
        now: u64,
        customize: impl FnOnce(RuntimeOptions) -> RuntimeOptions,
    ) -> anyhow::Result<Self> {
        let clock = ManualClock::new(now);
        let (tick, tick_rx) = unbounded();
        let (out_tx, out) = unbounded();
        let options = customize(RuntimeOptions::with_tick(Arc::new(clock.clone()), tick_rx));
        let aggregator = Aggregator::with_options(config, out_tx, options)?;
        Ok(Self {
            aggregator,
            clock,
            tick,
            out,
        })
    }

    /// Deliver a tick at `at` and return once the worker has handled it.
    pub fn tick(&self, at: u64) -> anyhow::Result<()> {
        self.tick.send(system_time(at))?;
        while !self.tick.is_empty() {
            thread::yield_now();
        }
        self.aggregator.snapshot()?;
        Ok(())
    }

    /// Output lines produced so far.
    pub fn lines(&self) -> Vec<String> {
        drain_lines(&self.out)
    }
}

pub fn drain_lines(out: &Receiver<Vec<u8>>) -> Vec<String> {
    out.try_iter()
        .map(|line| String::from_utf8_lossy(&line).into_owned())
        .collect()
}

/// Parse output lines into (key, value, timestamp).
pub fn parse_lines(lines: &[String]) -> Vec<(String, f64, u64)> {
    lines
        .iter()
        .map(|line| {
            let mut fields = line.split(' ');
            let key = fields.next().unwrap_or_default().to_string();
            let value = fields.next().and_then(|v| v.parse().ok()).unwrap_or(f64::NAN);
            let ts = fields.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            (key, value, ts)
        })
        .collect()
}
