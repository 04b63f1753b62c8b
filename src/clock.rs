//! Time sources and flush tick generation.
//!
//! All aggregation arithmetic happens in whole epoch seconds. The [`Clock`]
//! trait lets the worker loop and the match cache read "now" from either the
//! system clock or a [`ManualClock`] that tests advance explicitly.

use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in epoch seconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> u64;
}

/// Clock backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        unix_seconds(SystemTime::now())
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to an
/// aggregator and keep another to advance it.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `now` epoch seconds.
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a [`SystemTime`] to epoch seconds, saturating at zero for times
/// before the epoch.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The `SystemTime` for a number of epoch seconds.
pub fn system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Next boundary of the form `k * interval + offset` strictly after `now`.
pub fn next_aligned(now: Duration, interval: Duration, offset: Duration) -> Duration {
    let interval_nanos = interval.as_nanos().max(1);
    let offset_nanos = offset.as_nanos() % interval_nanos;
    let now_nanos = now.as_nanos();

    let base = now_nanos - now_nanos % interval_nanos + offset_nanos;
    let next = if base > now_nanos {
        base
    } else {
        base + interval_nanos
    };
    Duration::from_nanos(next as u64)
}

/// Spawn a ticker that fires at every `k * interval + offset` boundary.
///
/// The ticker thread exits once the returned receiver is dropped. The channel
/// holds two pending ticks; a slow consumer delays the ticker rather than
/// losing ticks.
pub fn aligned_tick(interval: Duration, offset: Duration) -> Receiver<SystemTime> {
    let (tx, rx) = bounded(2);

    let spawned = thread::Builder::new()
        .name("aggregator-ticker".to_string())
        .spawn(move || loop {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            let next = next_aligned(now, interval, offset);
            thread::sleep(next - now);
            if tx.send(UNIX_EPOCH + next).is_err() {
                tracing::debug!("tick receiver dropped, stopping ticker");
                return;
            }
        });
    if let Err(e) = spawned {
        // the receiver then never fires; the aggregator still flushes on shutdown
        tracing::error!(error = %e, "failed to spawn ticker thread");
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(100);
        let other = clock.clone();

        other.advance(5);
        assert_eq!(clock.now(), 105);

        clock.set(42);
        assert_eq!(other.now(), 42);
    }

    #[test]
    fn test_unix_seconds_round_trip() {
        assert_eq!(unix_seconds(system_time(1_700_000_000)), 1_700_000_000);
        assert_eq!(unix_seconds(UNIX_EPOCH - Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_next_aligned_with_offset() {
        let interval = Duration::from_secs(10);
        let offset = Duration::from_secs(5);

        assert_eq!(
            next_aligned(Duration::from_secs(100), interval, offset),
            Duration::from_secs(105)
        );
        assert_eq!(
            next_aligned(Duration::from_secs(105), interval, offset),
            Duration::from_secs(115)
        );
        assert_eq!(
            next_aligned(Duration::from_millis(107_500), interval, offset),
            Duration::from_secs(115)
        );
    }

    #[test]
    fn test_next_aligned_offset_larger_than_interval() {
        // offset wraps around the interval
        let next = next_aligned(
            Duration::from_secs(100),
            Duration::from_secs(10),
            Duration::from_secs(12),
        );
        assert_eq!(next, Duration::from_secs(102));
    }

    #[test]
    fn test_aligned_tick_fires() {
        let ticks = aligned_tick(Duration::from_millis(20), Duration::ZERO);
        let tick = ticks
            .recv_timeout(Duration::from_secs(2))
            .expect("ticker should fire");
        assert!(tick <= SystemTime::now());
    }
}
