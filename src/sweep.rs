
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default minimum interval between two sweeps of a session
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(1000);

/// SweepPolicy rate limits timeout sweeps triggered by traffic on a session.
///
/// There is no timer, a sweep only happens when an inbound or outbound
/// message gives us the chance, and at most once per `min_interval`.
#[derive(Debug)]
pub struct SweepPolicy {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
    sweeps: AtomicU64,
}

impl SweepPolicy {
    pub fn new(min_interval: Duration) -> SweepPolicy {
        SweepPolicy{ min_interval, last: Mutex::new(None), sweeps: AtomicU64::new(0) }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_sweep(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sweeps claimed or marked so far
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Claim the sweep due at `now`, if any.
    /// Returns true when the caller should sweep, the sweep time is recorded before returning.
    pub fn try_begin(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let due = match *last {
            None => true,
            Some(l) => now.saturating_duration_since(l) >= self.min_interval,
        };
        if due {
            *last = Some(now);
            self.sweeps.fetch_add(1, Ordering::Relaxed);
        }

        due
    }

    /// Record a sweep performed outside the policy
    pub fn mark(&self, now: Instant) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        SweepPolicy::new(DEFAULT_SWEEP_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_sweeps() {
        let p = SweepPolicy::default();
        assert_eq!(p.last_sweep(), None);

        let now = Instant::now();
        assert!(p.try_begin(now));
        assert_eq!(p.last_sweep(), Some(now));
    }

    #[test]
    fn test_rate_limited() {
        let p = SweepPolicy::default();
        let t0 = Instant::now();

        let swept = (0..5)
            .map(|i| t0 + Duration::from_millis(i * 200))
            .filter(|t| p.try_begin(*t))
            .count();
        assert_eq!(swept, 1);
        assert_eq!(p.sweeps(), 1);

        assert!(!p.try_begin(t0 + Duration::from_millis(999)));
        assert!(p.try_begin(t0 + Duration::from_millis(1000)));
        assert_eq!(p.last_sweep(), Some(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_mark_defers_next_sweep() {
        let p = SweepPolicy::new(Duration::from_millis(100));
        let t0 = Instant::now();

        p.mark(t0);
        assert!(!p.try_begin(t0 + Duration::from_millis(50)));
        assert!(p.try_begin(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_zero_interval_always_sweeps() {
        let p = SweepPolicy::new(Duration::from_millis(0));
        let t0 = Instant::now();
        assert!(p.try_begin(t0));
        assert!(p.try_begin(t0));
    }
}
