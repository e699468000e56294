//! Monotonic atomic counter

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free monotonic counter
///
/// Increments never lose updates under concurrent writers; reads are relaxed
/// snapshots.
#[derive(Debug, Default)]
pub struct Counter {
    v: AtomicU64,
}

impl Counter {
    /// Create a zeroed counter
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            v: AtomicU64::new(0),
        }
    }

    /// Add one
    #[inline]
    pub fn inc(&self) {
        self.v.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `delta`
    #[inline]
    pub fn add(&self, delta: u64) {
        self.v.fetch_add(delta, Ordering::Relaxed);
    }

    /// Add a duration in whole nanoseconds, saturating at `u64::MAX`
    #[inline]
    pub fn add_duration(&self, elapsed: Duration) {
        self.add(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }

    /// Reset to zero
    #[inline]
    pub fn reset(&self) {
        self.v.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_add_and_reset() {
        let c = Counter::new();
        c.inc();
        c.add(4);
        assert_eq!(c.load(), 5);

        c.reset();
        assert_eq!(c.load(), 0);
    }

    #[test]
    fn counter_duration_saturates() {
        let c = Counter::new();
        c.add_duration(Duration::from_nanos(1500));
        assert_eq!(c.load(), 1500);

        c.reset();
        c.add_duration(Duration::MAX);
        assert_eq!(c.load(), u64::MAX);
    }

    #[test]
    fn counter_no_lost_updates() {
        let c = Counter::new();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        c.inc();
                    }
                });
            }
        });
        assert_eq!(c.load(), 80_000);
    }
}
