
use std::time::Instant;

/// Clock provides the current time for deadlines and sweep rate limiting
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// SystemClock reads the monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
